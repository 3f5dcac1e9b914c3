use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bitverse::network::NodeId;
use bitverse::security::{
    generate_aes_secret,
    keys::{export_pem_files, generate_keypair},
    RSA_KEY_BITS,
};

/// bitverse-keys: key material for Bitverse message services and repositories.
#[derive(Parser, Debug)]
#[command(name = "bitverse-keys", version, about = "Key generation for Bitverse")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a fresh 256-bit AES secret as hex
    AesSecret,
    /// Write an RSA key pair to <file> (PKCS#1 private) and <file>.pub (SPKI public)
    RsaKeys {
        file: PathBuf,
        #[arg(long, default_value_t = RSA_KEY_BITS)]
        bits: usize,
    },
    /// Print a freshly generated node id
    NodeId,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::AesSecret => println!("{}", generate_aes_secret()),
        Commands::RsaKeys { file, bits } => {
            let (private, public) = generate_keypair(bits)?;
            let (prv_path, pub_path) = export_pem_files(&file, &private, &public)?;
            println!("private key: {}", prv_path.display());
            println!("public key:  {}", pub_path.display());
        }
        Commands::NodeId => println!("{}", NodeId::generate()),
    }
    Ok(())
}

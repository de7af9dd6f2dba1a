//! # Fnv1a Subcommand
//!
//! Prints the 32-bit FNV-1a hash the generator assigns to a setting name,
//! for looking up registry values and blob entries by hand.

use anyhow::Result;
use clap::Args;

use pal_settings_core::fnv1a_str;

/// Arguments for the fnv1a subcommand.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// String to hash, usually a setting name.
    pub input: String,

    /// Print as `0x`-prefixed hexadecimal instead of decimal.
    #[arg(long)]
    pub hex: bool,
}

pub fn format_hash(hash: u32, hex: bool) -> String {
    if hex {
        format!("0x{hash:08X}")
    } else {
        hash.to_string()
    }
}

/// Execute the fnv1a subcommand.
pub fn run_hash(args: &HashArgs) -> Result<u8> {
    println!("{}", format_hash(fnv1a_str(&args.input), args.hex));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_by_default() {
        assert_eq!(format_hash(0x811C_9DC5, false), "2166136261");
    }

    #[test]
    fn hex_is_zero_padded() {
        assert_eq!(format_hash(0xAB, true), "0x000000AB");
    }

    #[test]
    fn run_succeeds() {
        let args = HashArgs {
            input: "MaxFrames".to_string(),
            hex: true,
        };
        assert_eq!(run_hash(&args).unwrap(), 0);
    }
}

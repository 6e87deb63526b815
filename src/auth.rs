//! Credential resolution
//!
//! The API credential is a single bearer token. Resolution order: the
//! environment variable, then the stored entry, then a one-time interactive
//! prompt whose answer is stored for subsequent runs. Chat operations do not
//! proceed without one.

use std::env;
use std::io::{self, Write};

use crate::core::constants::API_KEY_ENV;
use crate::core::storage::StateStore;

pub fn resolve_credential(storage: &StateStore) -> Result<String, Box<dyn std::error::Error>> {
    if let Ok(value) = env::var(API_KEY_ENV) {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }

    if let Some(credential) = storage.credential()? {
        return Ok(credential);
    }

    let credential = prompt_for_credential()?;
    storage.store_credential(&credential)?;
    Ok(credential)
}

fn prompt_for_credential() -> Result<String, Box<dyn std::error::Error>> {
    println!("No API credential is configured yet.");
    println!("It will be stored locally and reused on the next run.");
    println!();

    loop {
        print!("Enter your API token: ");
        io::stdout().flush()?;

        let mut input = String::new();
        let read = io::stdin().read_line(&mut input)?;
        if read == 0 {
            return Err("no credential provided".into());
        }

        let token = input.trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
        println!("The token cannot be empty.");
    }
}

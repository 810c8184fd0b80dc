use std::error::Error;

use tasklock::crypto::fields::FieldCipher;
use tasklock::crypto::passwords::{hash_password, PasswordScheme};

use super::Context;

fn cipher(ctx: &Context) -> Result<FieldCipher, Box<dyn Error>> {
    let principal = ctx
        .credentials
        .principal()?
        .ok_or("not signed in. Run `tasklock login` first.")?;
    Ok(FieldCipher::for_user(&ctx.config.vault, &principal)?)
}

pub fn run_encrypt_field(ctx: &Context, text: &str) -> Result<(), Box<dyn Error>> {
    println!("{}", cipher(ctx)?.encrypt_field(text)?);
    Ok(())
}

pub fn run_decrypt_field(ctx: &Context, text: &str, lenient: bool) -> Result<(), Box<dyn Error>> {
    let cipher = cipher(ctx)?;
    let plaintext = if lenient {
        cipher.decrypt_field_lenient(text)
    } else {
        cipher.decrypt_field(text)?
    };
    println!("{plaintext}");
    Ok(())
}

pub fn run_hash_password(plaintext: &str, legacy: bool) -> Result<(), Box<dyn Error>> {
    let scheme = if legacy { PasswordScheme::Sha256 } else { PasswordScheme::Argon2id };
    println!("{}", hash_password(scheme, plaintext)?);
    Ok(())
}

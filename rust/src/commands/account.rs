use std::error::Error;

use super::Context;

pub fn run_register(ctx: &mut Context, username: &str, password: &str, display_name: &str) -> Result<(), Box<dyn Error>> {
    if username.trim().is_empty() || password.is_empty() {
        return Err("username and password must not be empty".into());
    }
    if ctx.credentials.has_credentials()? {
        println!("Replacing the previously registered account.");
    }
    ctx.credentials.register(username, password, display_name)?;
    println!("Registered {username}. Run `tasklock login` to sign in.");
    Ok(())
}

pub fn run_login(ctx: &mut Context, username: &str, password: &str) -> Result<(), Box<dyn Error>> {
    if !ctx.credentials.has_credentials()? {
        return Err("no account registered. Run `tasklock register` first.".into());
    }
    if !ctx.credentials.login(username, password)? {
        return Err("invalid username or password".into());
    }
    let name = ctx.credentials.display_name()?.unwrap_or_else(|| username.to_string());
    println!("Welcome, {name}.");
    Ok(())
}

pub fn run_logout(ctx: &mut Context) -> Result<(), Box<dyn Error>> {
    ctx.credentials.logout()?;
    println!("Signed out.");
    Ok(())
}

pub fn run_whoami(ctx: &Context) -> Result<(), Box<dyn Error>> {
    if !ctx.credentials.has_credentials()? {
        println!("No account registered.");
        return Ok(());
    }
    let username = ctx.credentials.username()?.unwrap_or_default();
    let display_name = ctx.credentials.display_name()?.unwrap_or_default();
    let state = if ctx.credentials.is_logged_in()? { "signed in" } else { "signed out" };
    println!("{username} ({display_name}), {state}");
    Ok(())
}

pub fn run_clear(ctx: &mut Context, yes: bool) -> Result<(), Box<dyn Error>> {
    if !yes {
        return Err("this wipes the registered account; pass --yes to confirm".into());
    }
    ctx.credentials.clear_all()?;
    println!("Credential store cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{run_clear, run_login, run_logout, run_register, run_whoami};
    use crate::commands::scratch_context;

    #[test]
    fn register_rejects_blank_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = scratch_context(dir.path());
        let err = run_register(&mut ctx, "  ", "pw", "Alice").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
        assert!(run_register(&mut ctx, "alice", "", "Alice").is_err());
        assert!(!ctx.credentials.has_credentials().unwrap());
    }

    #[test]
    fn login_needs_an_account_and_the_right_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = scratch_context(dir.path());
        let err = run_login(&mut ctx, "alice", "pw").unwrap_err();
        assert!(err.to_string().contains("no account registered"));

        run_register(&mut ctx, "alice", "pw", "Alice").unwrap();
        let err = run_login(&mut ctx, "alice", "nope").unwrap_err();
        assert!(err.to_string().contains("invalid username or password"));
        assert!(!ctx.credentials.is_logged_in().unwrap());

        run_login(&mut ctx, "alice", "pw").unwrap();
        assert_eq!(ctx.credentials.principal().unwrap().as_deref(), Some("alice"));
        run_whoami(&ctx).unwrap();
        run_logout(&mut ctx).unwrap();
        assert_eq!(ctx.credentials.principal().unwrap(), None);
    }

    #[test]
    fn clear_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = scratch_context(dir.path());
        run_register(&mut ctx, "alice", "pw", "Alice").unwrap();

        let err = run_clear(&mut ctx, false).unwrap_err();
        assert!(err.to_string().contains("--yes"));
        assert!(ctx.credentials.has_credentials().unwrap());

        run_clear(&mut ctx, true).unwrap();
        assert!(!ctx.credentials.has_credentials().unwrap());
    }
}

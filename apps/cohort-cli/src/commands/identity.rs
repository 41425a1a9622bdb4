use crate::context::Context;
use cohort_sync::{sign_in, IdentityProvider};

pub async fn cmd_login(
    ctx: &Context,
    name: &str,
    email: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = ctx.provider().with_credentials(name, email);
    let identity = sign_in(&provider, &*ctx.store).await?;

    println!("✓ Signed in as {}", identity.display_name);
    println!("  User ID: {}", identity.id);
    Ok(())
}

pub async fn cmd_logout(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let provider = ctx.provider();
    match provider.current_user() {
        Some(identity) => {
            provider.sign_out().await;
            println!("✓ Signed out {}", identity.display_name);
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

pub fn cmd_whoami(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    match ctx.current_user() {
        Some(identity) => {
            println!("{}", identity.display_name);
            println!("  User ID: {}", identity.id);
            if let Some(email) = identity.email {
                println!("  Email: {}", email);
            }
        }
        None => println!("Not signed in (guest). Run 'cohort login --name <name>'."),
    }
    Ok(())
}

use super::*;
pub(super) async fn handle_login(args: &LoginArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let password = match &args.password {
        Some(password) => password.clone(),
        None => read_password()?,
    };
    let profile = ctx.account.login(&args.username, &password).await?;
    println!("Logged in as {}", display_name(&profile.nickname, &profile.username));
    Ok(())
}

pub(super) async fn handle_logout(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.account.logout().await?;
    println!("Logged out");
    Ok(())
}

pub(super) async fn handle_whoami(ctx: &AppContext) -> anyhow::Result<()> {
    let state = ctx.account.restore().await;
    match (state, ctx.session.profile()) {
        (SessionState::LoggedIn, Some(profile)) => {
            println!("User: {}", display_name(&profile.nickname, &profile.username));
            println!("Id: {}", profile.id);
            println!("Coins: {}", profile.coin_count);
            println!("Level: {}", profile.level);
            if !profile.rank.is_empty() {
                println!("Rank: {}", profile.rank);
            }
        }
        _ => println!("Not logged in; run `reader login` to sign in"),
    }
    Ok(())
}

pub(super) fn display_name<'a>(nickname: &'a str, username: &'a str) -> &'a str {
    if nickname.is_empty() {
        username
    } else {
        nickname
    }
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}

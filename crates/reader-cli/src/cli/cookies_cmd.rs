use super::*;

pub(super) fn handle_cookies(args: &CookiesArgs, ctx: &AppContext) -> anyhow::Result<()> {
    match &args.command {
        CookiesCommands::Show(args) => handle_show(args, ctx),
        CookiesCommands::Clear => {
            ctx.cookies.clear();
            println!("Cookies cleared");
            Ok(())
        }
    }
}

fn handle_show(args: &ShowCookiesArgs, ctx: &AppContext) -> anyhow::Result<()> {
    let Some(host) = args.host.clone().or_else(|| ctx.base_host()) else {
        bail!("no host given and the base URL has none");
    };
    let url = Url::parse(&format!("https://{host}/")).with_context(|| format!("invalid host {host}"))?;
    let cookies = ctx.cookies.load_for_request(&url);
    if cookies.is_empty() {
        println!("No cookies stored for {host}");
        let others: Vec<String> = ctx
            .cookies
            .hosts()
            .into_iter()
            .filter(|other| other != &host)
            .collect();
        if !others.is_empty() {
            println!("Hosts with cookies: {}", others.join(", "));
        }
        return Ok(());
    }
    println!("Cookies for {host}:");
    for cookie in cookies {
        println!("  {cookie}");
    }
    Ok(())
}

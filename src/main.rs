// Copyright (c) 2025 MovieMind
// Licensed under the MIT License. See LICENSE file for details.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use inquire::{Password, Select, Text};
use tracing::Level;

use moviemind::{
    ClientConfig, DiscoverySession, Gateway, GatewayRecommendations, Outcome, SessionEvent,
    SessionManager, SocialClient, SwipeAction, UserCreate, UserLogin,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "moviemind")]
#[command(version = VERSION)]
#[command(about = "Movie discovery client. Swipe your way to tonight's film.")]
#[command(long_about = "MovieMind - movie discovery client\n\n\
    Create an account:   moviemind register\n\
    Sign in:             moviemind login\n\
    Who am I:            moviemind whoami\n\
    Discover movies:     moviemind discover \"un thriller des années 90\"\n\
    Find people:         moviemind suggest\n\n\
    Set MOVIEMIND_API_URL to point at a different backend.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register,

    /// Sign in with email and password
    Login {
        /// Email address (prompted if omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Sign out and clear stored credentials
    Logout,

    /// Show the signed-in profile
    Whoami,

    /// Swipe through movie recommendations for a prompt
    Discover {
        /// What you are in the mood for
        prompt: String,
        /// Recommend for a group instead of one person
        #[arg(short, long)]
        group: bool,
    },

    /// Suggested users to follow
    Suggest {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Search users by name
    Search {
        query: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Follow a user by id
    Follow { user_id: String },

    /// Unfollow a user by id
    Unfollow { user_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = ClientConfig::default();
    let session = SessionManager::new(&config).context("Failed to initialize session")?;
    session.initialize_auto_refresh();
    let gateway = Gateway::new(session.clone());

    // Expiry lands here, not inside the session layer. The CLI decides
    // what "go back to login" means.
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SessionEvent::Expired = event {
                eprintln!(
                    "{} Session expired. Run {} to sign in again.",
                    "[!]".yellow(),
                    "moviemind login".bold()
                );
            }
        }
    });

    match cli.command {
        Commands::Register => register(&session).await,
        Commands::Login { email } => login(&session, email).await,
        Commands::Logout => {
            session.logout().await;
            println!("{} Signed out.", "[ok]".green());
            Ok(())
        }
        Commands::Whoami => whoami(&session).await,
        Commands::Discover { prompt, group } => discover(&session, &gateway, prompt, group).await,
        Commands::Suggest { limit } => suggest(&SocialClient::new(gateway), limit).await,
        Commands::Search { query, limit } => {
            search(&SocialClient::new(gateway), &query, limit).await
        }
        Commands::Follow { user_id } => {
            let reply = SocialClient::new(gateway).follow(&user_id).await?;
            println!("{} {}", "[ok]".green(), reply.message);
            Ok(())
        }
        Commands::Unfollow { user_id } => {
            let reply = SocialClient::new(gateway).unfollow(&user_id).await?;
            println!("{} {}", "[ok]".green(), reply.message);
            Ok(())
        }
    }
}

async fn register(session: &SessionManager) -> Result<()> {
    let username = Text::new("Username:").prompt()?;
    let email = Text::new("Email:").prompt()?;
    let password = Password::new("Password:").prompt()?;

    let token = session
        .register(&UserCreate {
            username,
            email,
            password,
            first_name: None,
            last_name: None,
        })
        .await
        .context("Registration failed")?;

    println!(
        "{} Welcome, {}! Signed in for {} minutes.",
        "[ok]".green(),
        token.user.username.bold(),
        token.expires_in / 60
    );
    Ok(())
}

async fn login(session: &SessionManager, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(e) => e,
        None => Text::new("Email:").prompt()?,
    };
    let password = Password::new("Password:").without_confirmation().prompt()?;

    let token = session
        .login(&UserLogin { email, password })
        .await
        .context("Login failed")?;

    println!(
        "{} Signed in as {}.",
        "[ok]".green(),
        token.user.username.bold()
    );
    Ok(())
}

async fn whoami(session: &SessionManager) -> Result<()> {
    let user = session
        .current_user_remote()
        .await
        .context("Not signed in")?;
    println!("{} {} <{}>", user.username.bold(), user.id.dimmed(), user.email);
    if let Some(bio) = &user.bio {
        println!("  {}", bio);
    }
    Ok(())
}

async fn discover(
    session: &SessionManager,
    gateway: &Gateway,
    prompt: String,
    group: bool,
) -> Result<()> {
    if !session.is_authenticated() {
        anyhow::bail!("Sign in first: moviemind login");
    }

    let source = GatewayRecommendations::new(gateway.clone());
    let mut discovery = DiscoverySession::new(prompt, group, Vec::new());
    let count = discovery
        .refine(&source, "")
        .await
        .context("Could not fetch recommendations")?;
    println!("{} {} candidates.\n", "[ok]".green(), count);

    loop {
        let Some(movie) = discovery.current().cloned() else {
            break;
        };
        println!(
            "{} ({}) {}",
            movie.title.bold(),
            movie.year,
            movie.genres.join(", ").dimmed()
        );
        if !movie.summary.is_empty() {
            println!("  {}", movie.summary);
        }

        let choice = Select::new(
            "Your call:",
            vec!["Like", "Dislike", "Love (pick this one)", "Quit"],
        )
        .prompt()?;

        let action = match choice {
            "Like" => SwipeAction::Like,
            "Dislike" => SwipeAction::Dislike,
            "Love (pick this one)" => SwipeAction::Love,
            _ => break,
        };

        match discovery.decide(action)? {
            Outcome::Selected(movie) => {
                println!(
                    "\n{} Tonight's film: {}",
                    "[ok]".green(),
                    movie.title.bold().green()
                );
                return Ok(());
            }
            Outcome::Advanced => {}
            Outcome::Exhausted => {
                println!(
                    "\n{} Queue spent: {} liked, {} disliked.",
                    "[*]".cyan(),
                    discovery.tally().liked().len(),
                    discovery.tally().disliked().len()
                );
                let refinement = Text::new("Refine (empty to stop):").prompt()?;
                if refinement.trim().is_empty() {
                    break;
                }
                let count = discovery
                    .refine(&source, &refinement)
                    .await
                    .context("Refinement failed")?;
                println!("{} {} fresh candidates.\n", "[ok]".green(), count);
            }
        }
    }

    println!("No pick this time.");
    Ok(())
}

async fn suggest(social: &SocialClient, limit: usize) -> Result<()> {
    let reply = social
        .suggested_users(limit)
        .await
        .context("Could not fetch suggestions")?;
    if reply.suggestions.is_empty() {
        println!("No suggestions right now.");
        return Ok(());
    }
    for user in &reply.suggestions {
        println!("{}  {}", user.username.bold(), user.id.dimmed());
    }
    println!("{}", format!("{} total", reply.total).dimmed());
    Ok(())
}

async fn search(social: &SocialClient, query: &str, limit: usize) -> Result<()> {
    let users = social
        .search(query, limit)
        .await
        .context("Search failed")?;
    if users.is_empty() {
        println!("No users match {:?}.", query);
        return Ok(());
    }
    for user in &users {
        println!("{}  {}", user.username.bold(), user.id.dimmed());
    }
    Ok(())
}

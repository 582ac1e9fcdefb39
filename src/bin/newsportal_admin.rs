//! Administration CLI for records the web pages cannot create.
//!
//! Usage:
//!   newsportal-admin add-author <username>
//!   newsportal-admin add-category <name>
//!   newsportal-admin list
//!
//! Reads the same configuration as the server and applies pending
//! migrations before doing anything.

use anyhow::{bail, Context, Result};
use std::env;

use newsportal::{
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAuthorRepository, SqlxCategoryRepository, SqlxPostRepository,
            SqlxSessionRepository, SqlxUserRepository,
        },
        DatabasePool,
    },
    models::RecordRef,
    services::{PostService, UserService},
};

const USAGE: &str = "usage: newsportal-admin <add-author <username> | add-category <name> | list>";

#[tokio::main]
async fn main() {
    if let Err(e) = run(env::args().skip(1).collect()).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Vec<String>) -> Result<()> {
    let config = Config::load_with_env(&Config::default_path())?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let users = UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
    );
    let posts = PostService::new(
        SqlxPostRepository::boxed(pool.clone()),
        SqlxAuthorRepository::boxed(pool.clone()),
        SqlxCategoryRepository::boxed(pool.clone()),
    );

    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["add-author", username] => add_author(&users, &posts, username).await,
        ["add-category", name] => {
            let category = posts.add_category(name).await?;
            println!("Created category '{}' (id {})", category.name, category.id);
            Ok(())
        }
        ["list"] => list(&posts).await,
        _ => bail!(USAGE),
    };

    pool.close().await;
    result
}

/// Wrap a user as an author and put them in the authors group
async fn add_author(users: &UserService, posts: &PostService, username: &str) -> Result<()> {
    let user = users
        .get_by_username(username)
        .await?
        .with_context(|| format!("No user named '{}'", username))?;

    if posts
        .resolve_author(&RecordRef::Name(user.username.clone()))
        .await?
        .is_some()
    {
        bail!("'{}' is already an author", user.username);
    }

    let author = posts.add_author(user.id).await?;
    users.become_author(user.id).await?;
    println!("Created author '{}' (id {})", author.username, author.id);
    Ok(())
}

async fn list(posts: &PostService) -> Result<()> {
    println!("Authors:");
    for author in posts.authors().await? {
        println!("  {:>4}  {}", author.id, author.username);
    }
    println!("Categories:");
    for category in posts.categories().await? {
        println!("  {:>4}  {}", category.id, category.name);
    }
    Ok(())
}

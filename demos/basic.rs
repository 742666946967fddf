//! Basic example using the in-memory store behind a near cache

use salvo::prelude::*;
use salvo_cluster_session::{CachingStore, MemoryStore, SessionConfig, SessionDepotExt, SessionHandler};
use std::time::Duration;

#[handler]
async fn index(depot: &mut Depot) -> String {
    let session = depot.session().expect("Session not found");

    let views: i32 = session.get("views").unwrap_or(0);
    session.set("views", views + 1);

    format!(
        "Hello! You have viewed this page {} time(s).\nSession ID: {}",
        views + 1,
        session.id()
    )
}

#[handler]
async fn get_user(depot: &mut Depot) -> String {
    let session = depot.session().expect("Session not found");

    match session.get::<String>("user") {
        Some(user) => format!("Logged in as: {}", user),
        None => "Not logged in".to_string(),
    }
}

#[handler]
async fn login(req: &mut Request, depot: &mut Depot) -> String {
    let session = depot.session().expect("Session not found");

    let username = req.query::<String>("name").unwrap_or_else(|| "anonymous".to_string());

    // privilege change: rotate the id so a planted cookie is worthless
    let old_id = session.id();
    session.regenerate_id();
    session.set("user", &username);

    format!("Logged in as {}. Session {} replaced by {}", username, old_id, session.id())
}

#[handler]
async fn logout(depot: &mut Depot) -> &'static str {
    depot.session().expect("Session not found").destroy();
    "Logged out"
}

#[handler]
async fn fail(depot: &mut Depot, res: &mut Response) {
    // nothing written here survives a 500
    depot.session().expect("Session not found").set("views", -1);
    res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // pretend the shared store needs up to 100ms to propagate writes
    let store = CachingStore::new(MemoryStore::new().with_retry_timeout(Duration::from_millis(100)));

    let config = SessionConfig::new()
        .with_cookie_name("web.session")
        .with_session_timeout(Duration::from_secs(3600))
        .with_min_length(32);

    let session_handler = SessionHandler::new(store, config);

    let router = Router::new()
        .hoop(session_handler)
        .get(index)
        .push(Router::with_path("user").get(get_user))
        .push(Router::with_path("login").get(login))
        .push(Router::with_path("logout").get(logout))
        .push(Router::with_path("fail").get(fail));

    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    println!("Server running at http://127.0.0.1:5800");
    println!("Try these endpoints:");
    println!("  GET /                 - View counter");
    println!("  GET /user             - Get current user");
    println!("  GET /login?name=alice - Log in (rotates the session id)");
    println!("  GET /logout           - Destroy session");
    println!("  GET /fail             - 500 response, session left untouched");

    Server::new(acceptor).serve(router).await;
}

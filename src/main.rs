mod handlers;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use utils::{config::Config, db::establish_connection};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file FIRST before anything else
    dotenv::dotenv().ok();

    // Initialize logger with default level if RUST_LOG not set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=================================================");
    println!("🚀 Excel Analytics Backend Server");
    println!("=================================================");

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");
    let host = config.host.clone();
    let port = config.port;

    println!("📝 Configuration loaded:");
    println!(
        "   - Database: {}",
        config.database_url.split('@').last().unwrap_or("***")
    );
    println!("   - Host: {}", host);
    println!("   - Port: {}", port);
    println!("   - Upload dir: {}", config.upload_dir);
    println!(
        "   - Registration: {}",
        if config.allow_registration {
            "ENABLED"
        } else {
            "DISABLED"
        }
    );
    println!(
        "   - Log level: {}",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    );

    // Make sure the upload directory exists before accepting files
    services::storage::ensure_upload_dir(&config.upload_dir)
        .expect("Failed to create upload directory");

    // Establish database connection
    print!("🔌 Connecting to database... ");
    let db = establish_connection(&config.database_url)
        .await
        .expect("Failed to connect to database");
    println!("✅ Connected!");

    log::info!("Database connection established");

    // Start HTTP server
    println!("🌐 Starting HTTP server at http://{}:{}", host, port);
    println!("📍 Available endpoints:");
    println!("   - POST http://{}:{}/api/auth/register", host, port);
    println!("   - POST http://{}:{}/api/auth/login", host, port);
    println!(
        "   - GET  http://{}:{}/api/auth/me (JWT required)",
        host, port
    );
    println!(
        "   - POST http://{}:{}/api/upload (JWT required)",
        host, port
    );
    println!(
        "   - GET  http://{}:{}/api/upload/history (JWT required)",
        host, port
    );
    println!(
        "   - POST http://{}:{}/api/charts (JWT required)",
        host, port
    );
    println!(
        "   - GET  http://{}:{}/api/charts (JWT required)",
        host, port
    );
    println!(
        "   - GET  http://{}:{}/api/users (JWT + admin required)",
        host, port
    );
    println!("=================================================");

    log::info!("Server started at http://{}:{}", host, port);

    HttpServer::new(move || {
        // Strict CORS for authenticated API endpoints
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin(&config.frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(config.clone()))
            .wrap(Logger::default())
            .wrap(cors) // CORS must be wrapped AFTER Logger to ensure headers are added to all responses
            // Public endpoints (no authentication required)
            .service(
                web::scope("/api/auth")
                    .route("/register", web::post().to(handlers::auth::register))
                    .route("/login", web::post().to(handlers::auth::login))
                    .route(
                        "/me",
                        web::get()
                            .to(handlers::auth::me)
                            .wrap(crate::middleware::auth::JwtMiddleware),
                    ),
            )
            // Upload endpoints (JWT required)
            .service(
                web::scope("/api/upload")
                    .wrap(crate::middleware::auth::JwtMiddleware)
                    .route("", web::post().to(handlers::uploads::upload_file))
                    .route("/history", web::get().to(handlers::uploads::get_history))
                    .route("/{id}", web::get().to(handlers::uploads::get_upload))
                    .route("/{id}", web::delete().to(handlers::uploads::delete_upload)),
            )
            // Chart endpoints (JWT required)
            .service(
                web::scope("/api/charts")
                    .wrap(crate::middleware::auth::JwtMiddleware)
                    .route("", web::post().to(handlers::charts::create_chart))
                    .route("", web::get().to(handlers::charts::list_charts))
                    // Must be registered before /{id}
                    .route(
                        "/types/summary",
                        web::get().to(handlers::charts::get_types_summary),
                    )
                    .route("/{id}", web::get().to(handlers::charts::get_chart))
                    .route("/{id}", web::put().to(handlers::charts::update_chart))
                    .route("/{id}", web::delete().to(handlers::charts::delete_chart))
                    .route(
                        "/{id}/download",
                        web::post().to(handlers::charts::record_download),
                    ),
            )
            // Admin endpoints (JWT + admin check required)
            .service(
                web::scope("/api/users")
                    .wrap(crate::middleware::auth::JwtMiddleware)
                    .route("", web::get().to(handlers::users::list_users))
                    .route("/stats", web::get().to(handlers::users::get_user_stats))
                    .route("/{id}", web::get().to(handlers::users::get_user))
                    .route(
                        "/{id}/status",
                        web::put().to(handlers::users::update_user_status),
                    )
                    .route(
                        "/{id}/role",
                        web::put().to(handlers::users::update_user_role),
                    )
                    .route("/{id}", web::delete().to(handlers::users::delete_user)),
            )
    })
    .bind((host, port))?
    .run()
    .await
}

use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_cell::{BookingLedger, BookingState, SupabaseAppointmentStore, WorkingHours};
use reminder_cell::{
    HttpNotificationDispatcher, JobKind, ReminderConfig, ReminderDeliveryHandler,
    ReminderScheduler, ReminderWorkerService, SupabaseContactDirectory, SupabaseReminderJobStore,
    WorkerConfig,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareLink API server");

    // Load configuration
    let config = AppConfig::from_env();

    // Reminder pipeline: durable job store, contact lookup, scheduler. The
    // scheduler hangs off the ledger as its booking event hook.
    let job_store = Arc::new(SupabaseReminderJobStore::new(SupabaseClient::new(&config)));
    let directory = Arc::new(SupabaseContactDirectory::new(SupabaseClient::new(&config)));
    let scheduler = Arc::new(ReminderScheduler::new(
        job_store.clone(),
        directory,
        ReminderConfig::default(),
    ));

    // Booking ledger over the appointment store.
    let appointment_store = Arc::new(SupabaseAppointmentStore::new(SupabaseClient::new(&config)));
    let ledger = Arc::new(BookingLedger::new(appointment_store, scheduler.clone()));

    let state = Arc::new(BookingState {
        ledger,
        working_hours: WorkingHours::from_config(&config),
    });

    // Delivery worker, polling the job store in the background.
    if config.is_notification_configured() {
        let dispatcher = Arc::new(HttpNotificationDispatcher::new(&config));
        let worker = Arc::new(
            ReminderWorkerService::new(WorkerConfig::from_config(&config), job_store).with_handler(
                JobKind::AppointmentReminder,
                Arc::new(ReminderDeliveryHandler::new(dispatcher)),
            ),
        );
        tokio::spawn(async move { worker.run().await });
    } else {
        warn!("Notification service not configured, reminder worker disabled");
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

use log::{error, info, LevelFilter};

/// Ignite and launch the server, returning once it shuts down.
async fn serve() -> Result<(), rocket::Error> {
    info!("Configuring server...");
    let rocket = politirate::build().ignite().await?;
    info!("...server configured!");

    // Requests are logged by our own fairing from now on.
    log4rs_dynamic_filters::DynamicLevelFilter::set("rocket", LevelFilter::Off);
    rocket.launch().await?;
    Ok(())
}

#[rocket::main]
async fn main() {
    if let Err(e) = log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers()) {
        eprintln!("Failed to initialise logging: {e}");
        std::process::exit(1);
    }
    info!("Initialised logging");

    if let Err(e) = serve().await {
        error!("{e}");
        error!("Critical failure, shutting down");
        std::process::exit(1);
    }
}

//! Watch a device's state changes live.
//!
//! Point SONGPAL_ENDPOINT at the device API, e.g.
//! `SONGPAL_ENDPOINT=http://192.168.1.50:10000/sony cargo run --example monitor`

use std::sync::Arc;

use songpal_sdk::{Device, Endpoint, SdkError};

#[tokio::main]
async fn main() -> Result<(), SdkError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let device = Device::connect(Endpoint::from_env()?).await?;

    println!("{}", device.power().await?);
    for volume in device.volume_information().await? {
        println!("{volume}");
    }

    for service in ["system", "audio", "avContent"] {
        if !device.session().services().contains(&service.to_string()) {
            continue;
        }
        match device
            .listen_notifications(
                service,
                Arc::new(move |notification| {
                    println!("[{service}] {}: {:?}", notification.name, notification.payload);
                }),
            )
            .await
        {
            Ok(_subscription) => println!("listening on {service}"),
            Err(e) => eprintln!("cannot listen on {service}: {e}"),
        }
    }

    // Keep running until interrupted
    tokio::signal::ctrl_c()
        .await
        .expect("install ctrl-c handler");
    device.close();
    Ok(())
}

mod code;
mod handler;
mod reconnect;
mod registry;
mod request;
mod response;
mod room;
mod state;

use crate::handler::{Ctx, HostQuery};
use crate::reconnect::{Reconnect, RECONNECTION_GRACE};
use crate::registry::Registry;
use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use warp::Filter;

/// Shared video playback sync server
#[derive(Debug, Parser)]
struct Options {
    /// bind addr
    #[arg(default_value = "127.0.0.1:3000")]
    addr: String,

    /// secret used to sign reconnection keys
    #[arg(short, long)]
    secret: String,

    /// cert file
    #[arg(short, long)]
    cert: Option<PathBuf>,

    /// key file
    #[arg(short, long)]
    key: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let _ = env_logger::try_init();
    let options = Options::parse();

    let registry = Arc::new(Registry::new());
    let reconnect = Arc::new(Reconnect::new(
        &options.secret,
        registry.clone(),
        RECONNECTION_GRACE,
    ));
    let ctx = Ctx { registry, reconnect };
    let ctx = warp::any().map(move || ctx.clone());

    let addr: SocketAddr = options.addr.parse().expect("Cannot parse addr!");

    let host = warp::path!("ws")
        .and(warp::ws())
        .and(warp::query::<HostQuery>())
        .and(ctx.clone())
        .map(|ws: warp::ws::Ws, query: HostQuery, ctx: Ctx| {
            ws.on_upgrade(move |ws| handler::host_connected(ws, query, ctx))
        });

    let path = warp::get()
        .and(warp::path!("room" / String / "path"))
        .and(ctx.clone())
        .map(handler::room_path);

    let events = warp::get()
        .and(warp::path!("room" / String))
        .and(ctx.clone())
        .map(handler::room_events);

    let stats = warp::get()
        .and(warp::path::end())
        .and(ctx.clone())
        .map(|ctx: Ctx| warp::reply::json(&ctx.registry.stats()));

    let cors = warp::cors().allow_any_origin().allow_methods(vec!["GET"]);

    let routes = host
        .or(path)
        .or(events)
        .or(stats)
        .with(cors)
        .with(warp::log("syncroom"));

    if options.cert.is_some() && options.key.is_some() {
        info!("Starting with TLS");
        warp::serve(routes)
            .tls()
            .cert_path(options.cert.as_ref().unwrap())
            .key_path(options.key.as_ref().unwrap())
            .run(addr)
            .await;
    } else {
        info!("Starting without TLS");
        warp::serve(routes).run(addr).await;
    }
}

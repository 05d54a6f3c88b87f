//! Two processes passing pings and pongs back and forth over unbuffered channels.

use csp::*;
use std::{
    ops::ControlFlow,
    time::Duration,
};
use anyhow::Result;
use tracing::info;


const PINGS: u32 = 10;
const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
enum Ping {
    Ping(u64),
    Finished,
}

#[derive(Debug, Clone)]
struct Pong(u64);

fn pinger(ping_out: SendPort<Ping>, pong_in: ReceivePort<Pong>, count: u32) -> Async<()> {
    Async::iterate(count, move |remaining| {
        if remaining == 0 {
            return ping_out.send(Ping::Finished).map(ControlFlow::Break);
        }
        let id = rand::random::<u64>();
        Async::lift(move || info!(id, "sending ping"))
            .then(ping_out.send(Ping::Ping(id)))
            .then(pong_in.receive())
            .map(move |Pong(id)| {
                info!(id, "received pong");
                ControlFlow::Continue(remaining - 1)
            })
    })
}

fn ponger(ping_in: ReceivePort<Ping>, pong_out: SendPort<Pong>) -> Async<()> {
    Async::iterate((), move |()| {
        let pong_out = pong_out.clone();
        ping_in.receive().bind(move |ping| match ping {
            Ping::Ping(id) => {
                info!(id, "received ping, sending pong");
                pong_out.send(Pong(id)).map(ControlFlow::Continue)
            }
            Ping::Finished => {
                info!("received finish signal");
                Async::unit(ControlFlow::Break(()))
            }
        })
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let pool = WorkerPool::new(PoolConfig::default())?;

    let done = new_channel::<Ping>(0)
        .bind(|pings| new_channel::<Pong>(0).bind(move |pongs| {
            Async::fork(pinger(pings.send_port().clone(), pongs.receive_port().clone(), PINGS))
                .then(ponger(pings.receive_port().clone(), pongs.send_port().clone()))
        }))
        .run(pool.exec());
    done.block_timeout(TIMEOUT)?;

    pool.shutdown(Duration::from_secs(1));
    Ok(())
}

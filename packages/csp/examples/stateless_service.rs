//! A request/response service built from channels, where each call carries its own reply
//! channel.

use csp::*;
use std::{
    ops::ControlFlow,
    sync::Arc,
    time::Duration,
};
use anyhow::Result;
use tracing::debug;


const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct Request<Req, Rep> {
    payload: Req,
    reply: SendPort<Rep>,
}

/// Handle for calling a running service
#[derive(Clone)]
struct ServiceHandle<Req, Rep> {
    requests: SendPort<Request<Req, Rep>>,
}

impl<Req, Rep> ServiceHandle<Req, Rep>
where
    Req: Clone + Send + Sync + 'static,
    Rep: Clone + Send + Sync + 'static,
{
    fn call(&self, payload: Req) -> Async<Rep> {
        let requests = self.requests.clone();
        new_channel::<Rep>(0).bind(move |reply| {
            requests
                .send(Request { payload, reply: reply.send_port().clone() })
                .then(reply.receive_port().receive())
        })
    }
}

// serve requests forever, replying to each one independently of the next.
fn serve<Req, Rep, F>(requests: ReceivePort<Request<Req, Rep>>, f: Arc<F>) -> Async<()>
where
    Req: Clone + Send + Sync + 'static,
    Rep: Clone + Send + Sync + 'static,
    F: Fn(Req) -> Rep + Send + Sync + 'static,
{
    Async::iterate((), move |()| {
        let f = Arc::clone(&f);
        requests.receive().bind(move |Request { payload, reply }| {
            debug!(reply_channel = %reply.id(), "serving request");
            Async::fork(reply.send(f(payload))).map(ControlFlow::Continue)
        })
    })
}

fn start_service<Req, Rep, F>(f: F) -> Async<ServiceHandle<Req, Rep>>
where
    Req: Clone + Send + Sync + 'static,
    Rep: Clone + Send + Sync + 'static,
    F: Fn(Req) -> Rep + Send + Sync + 'static,
{
    new_channel(0).bind(move |requests| {
        let (send, receive) = requests.into_ports();
        Async::fork(serve(receive, Arc::new(f)))
            .then(Async::unit(ServiceHandle { requests: send }))
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let pool = WorkerPool::new(PoolConfig::default())?;

    let capitalize = start_service(|s: String| s.to_uppercase())
        .run(pool.exec())
        .block_timeout(TIMEOUT)?;
    let reply = capitalize
        .call("hello world".to_owned())
        .run(pool.exec())
        .block_timeout(TIMEOUT)?;
    println!("{}", reply);

    pool.shutdown(Duration::from_secs(1));
    Ok(())
}

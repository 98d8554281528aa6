use std::net::SocketAddr;

use log::info;

use super::routes::{api_routes, ApiContext};

/// HTTP front of the segmentation service.
pub struct WebServer {
    ctx: ApiContext,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(ctx: ApiContext, addr: SocketAddr) -> Self {
        Self { ctx, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves the API until the future is dropped.
    pub async fn start(&self) {
        let routes = api_routes(self.ctx.clone());
        info!("Web interface listening on http://{}", self.addr);
        warp::serve(routes).run(self.addr).await;
    }
}

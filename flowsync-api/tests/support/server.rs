#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use flowsync_api::create_service;
use flowsync_api::proto::backend::flow_service_server::{FlowService, FlowServiceServer};
use flowsync_api::proto::{self, flow_request, FlowRequest, FlowResponse};
use flowsync_core::Flow;
use flowsync_storage::InMemoryCacheStore;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Endpoint, Server};
use tonic::{Request, Response, Status};

/// Backend double serving a fixed flow list and recording what it was asked.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub flows: Vec<Flow>,
    pub expected_token: Option<String>,
    pub seen: Arc<Mutex<Vec<flow_request::Query>>>,
}

#[tonic::async_trait]
impl FlowService for FakeBackend {
    async fn get_flow(
        &self,
        request: Request<FlowRequest>,
    ) -> Result<Response<FlowResponse>, Status> {
        if let Some(token) = &self.expected_token {
            let header = request
                .metadata()
                .get("authorization")
                .and_then(|value| value.to_str().ok());
            if header != Some(format!("Bearer {}", token).as_str()) {
                return Err(Status::unauthenticated("bad session token"));
            }
        }

        let query = request
            .into_inner()
            .query
            .ok_or_else(|| Status::invalid_argument("missing query"))?;
        self.seen.lock().unwrap().push(query);

        Ok(Response::new(FlowResponse {
            flows: self.flows.iter().map(proto::Flow::from).collect(),
        }))
    }
}

async fn bind() -> (TcpListenerStream, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (TcpListenerStream::new(listener), addr)
}

pub async fn spawn_backend(backend: FakeBackend) -> SocketAddr {
    let (incoming, addr) = bind().await;
    tokio::spawn(
        Server::builder()
            .add_service(FlowServiceServer::new(backend))
            .serve_with_incoming(incoming),
    );
    addr
}

pub async fn spawn_configuration_server(store: Arc<InMemoryCacheStore>) -> SocketAddr {
    let (incoming, addr) = bind().await;
    tokio::spawn(
        Server::builder()
            .add_service(create_service(store))
            .serve_with_incoming(incoming),
    );
    addr
}

pub async fn connect(addr: SocketAddr) -> Channel {
    Endpoint::from_shared(format!("http://{}", addr))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

//! Unary gRPC client for the peer's `gateway.Gateway` service.

use std::time::Duration;

use http::uri::PathAndQuery;
use tonic::{Request, Status, client::Grpc, codec::ProstCodec, transport::Channel};

use crate::proto::gateway::{
    CommitStatusResponse, EndorseRequest, EndorseResponse, EvaluateRequest, EvaluateResponse,
    SignedCommitStatusRequest, SubmitRequest, SubmitResponse,
};

const EVALUATE_PATH: &str = "/gateway.Gateway/Evaluate";
const ENDORSE_PATH: &str = "/gateway.Gateway/Endorse";
const SUBMIT_PATH: &str = "/gateway.Gateway/Submit";
const COMMIT_STATUS_PATH: &str = "/gateway.Gateway/CommitStatus";

/// Thin client over one gRPC channel. Cloning shares the channel.
#[derive(Debug, Clone)]
pub(crate) struct GatewayClient {
    inner: Grpc<Channel>,
}

impl GatewayClient {
    pub(crate) fn new(channel: Channel) -> Self {
        Self { inner: Grpc::new(channel) }
    }

    pub(crate) async fn evaluate(
        &mut self,
        request: EvaluateRequest,
        timeout: Duration,
    ) -> Result<EvaluateResponse, Status> {
        self.unary(request, EVALUATE_PATH, timeout).await
    }

    pub(crate) async fn endorse(
        &mut self,
        request: EndorseRequest,
        timeout: Duration,
    ) -> Result<EndorseResponse, Status> {
        self.unary(request, ENDORSE_PATH, timeout).await
    }

    pub(crate) async fn submit(
        &mut self,
        request: SubmitRequest,
        timeout: Duration,
    ) -> Result<SubmitResponse, Status> {
        self.unary(request, SUBMIT_PATH, timeout).await
    }

    pub(crate) async fn commit_status(
        &mut self,
        request: SignedCommitStatusRequest,
        timeout: Duration,
    ) -> Result<CommitStatusResponse, Status> {
        self.unary(request, COMMIT_STATUS_PATH, timeout).await
    }

    async fn unary<Req, Resp>(
        &mut self,
        message: Req,
        path: &'static str,
        timeout: Duration,
    ) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("peer channel not ready: {e}")))?;

        let mut request = Request::new(message);
        request.set_timeout(timeout);

        let codec = ProstCodec::<Req, Resp>::default();
        let response =
            self.inner.unary(request, PathAndQuery::from_static(path), codec).await?;
        Ok(response.into_inner())
    }
}

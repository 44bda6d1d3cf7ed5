//! Build script for flowsync API
//!
//! Generates the gRPC client and server stubs for the backend flow service
//! and the bulk configuration service. Message types are plain prost structs
//! in `src/proto.rs`, so no `.proto` compilation (and no `protoc`) is needed.

use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path(CODEC)
        .build()
}

fn main() {
    let flow_service = Service::builder()
        .name("FlowService")
        .package("flowsync.backend")
        .method(method(
            "get_flow",
            "GetFlow",
            "crate::proto::FlowRequest",
            "crate::proto::FlowResponse",
        ))
        .build();

    let configuration_service = Service::builder()
        .name("ConfigurationService")
        .package("flowsync.configuration")
        .method(method(
            "update",
            "Update",
            "crate::proto::ConfigurationRequest",
            "crate::proto::ConfigurationResponse",
        ))
        .method(method(
            "delete",
            "Delete",
            "crate::proto::ConfigurationRequest",
            "crate::proto::ConfigurationResponse",
        ))
        .build();

    Builder::new().compile(&[flow_service, configuration_service]);

    println!("cargo:rerun-if-changed=build.rs");
}

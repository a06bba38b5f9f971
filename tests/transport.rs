use std::io::Read;
use std::net::TcpListener;
use std::thread::JoinHandle;

use face_relay::client::{HttpTransport, InferenceTransport};
use face_relay::error::TransportError;
use face_relay::protocol::{EncodedFrame, FramePayload};
use image::RgbImage;
use tiny_http::{Response, Server};

fn payload() -> FramePayload {
    let frame = RgbImage::new(8, 8);
    let encoded = EncodedFrame::encode(&frame, 70).unwrap();
    FramePayload::new(encoded, (8, 8)).unwrap()
}

fn spawn_endpoint(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let endpoint = format!("http://127.0.0.1:{port}/infer_frame");
    let reply = Response::from_string(body.to_string()).with_status_code(status);
    let handle = std::thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let mut received = String::new();
        request.as_reader().read_to_string(&mut received).unwrap();
        request.respond(reply).unwrap();
        received
    });
    (endpoint, handle)
}

#[test]
fn ok_response_decodes_into_a_result() {
    let (endpoint, server) = spawn_endpoint(
        200,
        r#"{"faces": [{"bbox": [1, 2, 3, 4], "autism_score": 0.9}], "inference_time_ms": 17.0}"#,
    );
    let transport = HttpTransport::new(endpoint);
    let result = transport.infer(&payload()).unwrap();
    server.join().unwrap();

    assert_eq!(result.faces.len(), 1);
    assert_eq!(result.faces[0].behavior_score, Some(0.9));
    assert_eq!(result.inference_time_ms, Some(17.0));
}

#[test]
fn request_body_is_a_single_data_url_field() {
    let (endpoint, server) = spawn_endpoint(200, r#"{"faces": []}"#);
    let transport = HttpTransport::new(endpoint);
    transport.infer(&payload()).unwrap();
    let received = server.join().unwrap();

    let value: serde_json::Value = serde_json::from_str(&received).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 1);
    assert!(object["frame"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[test]
fn non_2xx_status_is_a_status_error() {
    let (endpoint, server) = spawn_endpoint(500, "boom");
    let transport = HttpTransport::new(endpoint);
    let err = transport.infer(&payload()).unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, TransportError::Status(500)));
}

#[test]
fn malformed_body_is_a_decode_error() {
    let (endpoint, server) = spawn_endpoint(200, "not json at all");
    let transport = HttpTransport::new(endpoint);
    let err = transport.infer(&payload()).unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, TransportError::Decode(_)));
}

#[test]
fn unreachable_endpoint_is_a_request_error() {
    // bind then drop to find a port with nothing listening
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = HttpTransport::new(format!("http://127.0.0.1:{port}/infer_frame"));
    let err = transport.infer(&payload()).unwrap_err();
    assert!(matches!(err, TransportError::Request(_)));
}

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{png, Harness};
use facegate::protocol::{
    read_message, send_message, AccessResponse, RegistrationRequest, Request, Response, ResponseBody,
    VerifyRequest,
};
use facegate::{AccessPolicy, EnrollmentPolicy, Gate, ServiceClient};
use std::os::unix::net::UnixListener;
use std::sync::Arc;

fn gate(harness: &Harness) -> Gate {
    Gate::new(harness.collaborators(), AccessPolicy::default(), EnrollmentPolicy::default())
}

fn verify(image: String) -> Request {
    Request::Verify(VerifyRequest { image })
}

fn register(image: String, cedula: &str) -> Request {
    Request::Register(RegistrationRequest {
        image,
        first_name: "Ana".to_string(),
        last_name: "Ruiz".to_string(),
        cedula: cedula.to_string(),
        city: "Quito".to_string(),
    })
}

fn access_body(response: &Response) -> &AccessResponse {
    match &response.body {
        ResponseBody::Access(body) => body,
        other => panic!("expected access body, got {:?}", other),
    }
}

#[test]
fn verify_maps_outcomes_to_envelopes() {
    let harness = Harness::new();
    harness.faces.add_match("face-0001", 99.0);
    harness.identities.insert("face-0001", "Ana", "Ruiz", "1036");

    let granted = gate(&harness).handle(verify(STANDARD.encode(png())));
    assert_eq!(granted.status_code, 200);
    let body = access_body(&granted);
    assert_eq!(body.status, "Access Granted");
    assert_eq!(body.message, "Access Granted for Ana Ruiz (Employee ID: 1036)");
    assert_eq!(body.employee_id.as_deref(), Some("1036"));

    harness.faces.set_face_count(2);
    let unknown = gate(&harness).handle(verify(STANDARD.encode(png())));
    assert_eq!(unknown.status_code, 400);
    assert_eq!(access_body(&unknown).status, "Access Denied");
    assert_eq!(access_body(&unknown).employee_id, None);
}

#[test]
fn verify_denied_is_403() {
    let harness = Harness::new();

    let denied = gate(&harness).handle(verify(STANDARD.encode(png())));

    assert_eq!(denied.status_code, 403);
    assert_eq!(access_body(&denied).message, "Access Denied: Face not recognized.");
}

#[test]
fn line_wrapped_base64_is_accepted() {
    let harness = Harness::new();
    let encoded = STANDARD.encode(png());
    let wrapped = encoded
        .as_bytes()
        .chunks(76)
        .map(|line| std::str::from_utf8(line).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    assert!(wrapped.len() > encoded.len());

    let response = gate(&harness).handle(verify(wrapped));

    assert_eq!(response.status_code, 403);
    assert_eq!(access_body(&response).status, "Access Denied");
}

#[test]
fn bad_base64_is_an_invalid_image() {
    let harness = Harness::new();

    let response = gate(&harness).handle(verify("%%% not base64 %%%".to_string()));

    assert_eq!(response.status_code, 400);
    let body = access_body(&response);
    assert_eq!(body.status, "Error");
    assert_eq!(body.message, "Invalid image format");
    assert!(harness.no_side_effects());
}

#[test]
fn register_returns_face_id_and_cedula() {
    let harness = Harness::new();

    let response = gate(&harness).handle(register(STANDARD.encode(png()), "1036"));

    assert_eq!(response.status_code, 200);
    match response.body {
        ResponseBody::Registration(body) => {
            assert_eq!(body.message, "Employee registered successfully");
            assert_eq!(body.cedula.as_deref(), Some("1036"));
            let face_id = body.face_id.expect("face id");
            assert_eq!(harness.faces.indexed.lock().unwrap()[0].0, face_id);
        }
        other => panic!("expected registration body, got {:?}", other),
    }
}

#[test]
fn register_checks_fields_before_image() {
    let harness = Harness::new();

    let missing = gate(&harness).handle(register("%%%".to_string(), ""));
    assert_eq!(missing.status_code, 400);
    assert_eq!(missing.message(), "Missing required fields");

    let bad_id = gate(&harness).handle(register("%%%".to_string(), "ñ ñ"));
    assert_eq!(bad_id.message(), "Invalid characters in ID (Cedula)");

    let bad_image = gate(&harness).handle(register("%%%".to_string(), "1036"));
    assert_eq!(bad_image.message(), "Invalid image format");

    assert_eq!(harness.identities.len(), 0);
}

#[test]
fn register_without_collection_is_500() {
    let harness = Harness::new();
    harness.faces.collections.lock().unwrap().clear();

    let response = gate(&harness).handle(register(STANDARD.encode(png()), "1036"));

    assert_eq!(response.status_code, 500);
    assert_eq!(response.message(), "Face collection employees not found");
}

#[test]
fn client_round_trips_over_a_socket() {
    let tmp = tempfile::TempDir::new().unwrap();
    let socket_path = tmp.path().join("facegate.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    let harness = Harness::new();
    harness.faces.add_match("face-0001", 99.0);
    harness.identities.insert("face-0001", "Ana", "Ruiz", "1036");
    let gate = Arc::new(gate(&harness));

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request: Request = read_message(&mut stream, 16 * 1024 * 1024).unwrap();
        send_message(&mut stream, &gate.handle(request)).unwrap();
    });

    let response = ServiceClient::with_socket(socket_path).verify(&png()).unwrap();
    server.join().unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(access_body(&response).employee_id.as_deref(), Some("1036"));
}

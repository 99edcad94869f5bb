//! Direct request/response scenarios without mock endpoints

use harness::{HarnessResult, Scenario};
use shared::Payload;

use super::data_file;
use crate::fake_esb::EsbLayout;
use crate::fake_esb::services::{PASSWORD_HEADER, USERNAME_HEADER, ping_request, ping_response};

pub fn scenarios(layout: &EsbLayout) -> HarnessResult<Vec<Scenario>> {
    Ok(vec![
        Scenario::sync(layout.ping_service.as_str(), "Simple WS PING test")
            .request_body(ping_request("PING"))
            .expected_response_body(ping_response("PONG"))
            .build()?,
        Scenario::sync(layout.secure_ping_service.as_str(), "Simple WS PING test with credentials")
            .request_body(ping_request("PING"))
            .request_header(USERNAME_HEADER, layout.username.as_str())
            .request_header(PASSWORD_HEADER, layout.password.as_str())
            .expected_response_body(ping_response("PONG"))
            .build()?,
        Scenario::sync(layout.ping_service.as_str(), "Simple WS PING test with local resources")
            .request_body(data_file("pingRequest1.xml")?)
            .expected_response_body(data_file("pingResponse1.xml")?)
            .build()?,
        Scenario::sync(layout.json_ping_service.as_str(), "Simple JSON PING")
            .request_body(Payload::json(r#"{"request":"PING"}"#))
            .expected_response_body(Payload::json(r#"{"response":"PONG"}"#))
            .build()?,
    ])
}

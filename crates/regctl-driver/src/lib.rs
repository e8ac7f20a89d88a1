//! The driver session: connects to a device simulator, performs register
//! reads/writes with write verification, and exposes the high-level
//! sensor/actuator/power/reset API (spec §4.4).
#![forbid(unsafe_code)]

mod api;
mod error;
mod registers;
mod session;

pub use api::Status;
pub use error::{Error, ErrorKind};
pub use session::{DriverSession, LogCallback, DEFAULT_TIMEOUT};

#[cfg(test)]
mod tests {
    use regctl_device::Server;
    use regctl_protocol::{Base, Component};

    use super::*;

    async fn connected_session(server: &Server) -> DriverSession {
        let session = DriverSession::new(None);
        let addr = server.local_addr();
        session.connect(&addr.ip().to_string(), addr.port()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn connect_reads_ack_and_status_reflects_initial_state() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        let status = session.get_status().await.unwrap();
        assert!(status.connected);
        assert!(status.sensors_powered);
        assert!(status.actuators_powered);
        assert!(!status.has_errors);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn connect_twice_is_already_initialized() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        let addr = server.local_addr();
        let err = session.connect(&addr.ip().to_string(), addr.port()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn register_access_without_connection_is_not_connected() {
        let session = DriverSession::new(None);
        let err = session.get_led().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn led_set_and_get_round_trip() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        session.set_led(0x80).await.unwrap();
        assert_eq!(session.get_led().await.unwrap(), 0x80);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn heater_set_preserves_upper_nibble() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        session.set_heater(0x55).await.unwrap();
        assert_eq!(session.get_heater().await.unwrap(), 0x05);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn door_set_and_get_state_round_trip() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        session.set_door(2, true).await.unwrap();
        assert!(!session.get_door_state(1).await.unwrap());
        assert!(session.get_door_state(2).await.unwrap());
        assert!(!session.get_door_state(3).await.unwrap());
        assert!(!session.get_door_state(4).await.unwrap());

        session.set_door(2, false).await.unwrap();
        assert!(!session.get_door_state(2).await.unwrap());

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn set_door_out_of_range_is_invalid_parameter() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        let err = session.set_door(5, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn power_cycle_gates_sensor_reads_at_zero() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        session.set_power_state(Component::Temperature, false).await.unwrap();
        assert!(!session.get_power_state(Component::Temperature).await.unwrap());
        assert_eq!(session.get_temperature().await.unwrap(), 0);

        session.set_power_state(Component::Temperature, true).await.unwrap();
        assert!(session.get_power_state(Component::Temperature).await.unwrap());

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn reset_component_is_accepted() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        session.reset_component(Component::Led).await.unwrap();

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn write_to_main_base_is_rejected_locally() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        let err = session.write_register(Base::Main, 0x02, 0xFF).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn send_raw_round_trips_a_frame() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        let response = session.send_raw("100000").await.unwrap();
        assert_eq!(response, "10000FF");

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn send_raw_rejects_malformed_frame_locally() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let session = connected_session(&server).await;

        let err = session.send_raw("bogus").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolError);

        session.disconnect().await.unwrap();
        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn set_timeout_triggers_timeout_on_unresponsive_peer() {
        // A bare listener that accepts but never sends ACK models an
        // unresponsive peer for P9 (timeout liveness).
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
            // Never write anything; let the connection idle.
            std::future::pending::<()>().await;
        });

        let session = DriverSession::new(None);
        session.set_timeout(50).await.unwrap();
        let err = session.connect(&addr.ip().to_string(), addr.port()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn last_error_message_reflects_most_recent_failure() {
        let session = DriverSession::new(None);
        assert!(session.get_last_error_message().await.is_none());

        let _ = session.get_led().await;
        let message = session.get_last_error_message().await;
        assert!(message.is_some());
    }
}

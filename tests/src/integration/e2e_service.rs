//! # End-to-End Service Flow
//!
//! A client talks to a running [`CourierRuntime`] purely through envelopes
//! on the bus.
//!
//! ```text
//! client ──user_creation_request──▶ bus ──▶ gateway ──▶ user service
//!   ▲                                                       │
//!   └──────────── user_creation_reply / user_created ◀──────┘
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use courier_bus::{EnvelopeFilter, EnvelopePublisher, InMemoryEnvelopeBus, Subscription};
    use courier_envelope::event_types::{
        SERVICE_CONNECT, USER_CREATION_EVENT, USER_CREATION_REPLY, USER_CREATION_REQUEST,
        USER_UPDATE_REPLY, USER_UPDATE_REQUEST,
    };
    use courier_envelope::headers::REQUESTER_ID;
    use courier_envelope::{Category, Envelope, EnvelopeBuilder, User};
    use courier_runtime::{CourierConfig, CourierRuntime, UserReply};
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    async fn started(config: CourierConfig) -> (CourierRuntime, Arc<InMemoryEnvelopeBus>) {
        let mut runtime = CourierRuntime::new(config).unwrap();
        let bus = runtime.bus();
        runtime.start().await.unwrap();
        (runtime, bus)
    }

    fn request(
        event_type: &str,
        user: &User,
        correlation_id: &str,
        requester: Option<&str>,
    ) -> Envelope {
        let mut builder = EnvelopeBuilder::new()
            .with_from("web-console")
            .with_reply_to("web-console.replies")
            .with_correlation_id(correlation_id)
            .with_event_type(event_type)
            .with_payload(user)
            .unwrap();
        if let Some(id) = requester {
            builder.add_custom_header(REQUESTER_ID, id).unwrap();
        }
        builder.build().unwrap()
    }

    async fn next(sub: &mut Subscription) -> Envelope {
        timeout(Duration::from_millis(500), sub.recv())
            .await
            .expect("timeout")
            .expect("envelope")
    }

    fn ada() -> User {
        User::new("U1", "ada", "ada@example.org").with_entity("E1")
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_create_then_update_as_self() {
        let (runtime, bus) = started(CourierConfig::default()).await;
        let mut replies = bus.subscribe(EnvelopeFilter::event_types([
            USER_CREATION_REPLY,
            USER_UPDATE_REPLY,
        ]));
        let mut events = bus.subscribe(EnvelopeFilter::event_types([USER_CREATION_EVENT]));

        bus.publish(&request(USER_CREATION_REQUEST, &ada(), "c-1", None))
            .await
            .unwrap();

        let reply = next(&mut replies).await;
        assert_eq!(reply.correlation_id(), Some("c-1"));
        assert!(reply.payload_as::<UserReply>().unwrap().success);

        let created = next(&mut events).await;
        assert_eq!(created.from(), "courier");
        assert_eq!(created.payload_as::<User>().unwrap(), ada());

        // The new user now acts as requester for their own update.
        let renamed = ada().with_name("Ada Lovelace");
        bus.publish(&request(USER_UPDATE_REQUEST, &renamed, "c-2", Some("U1")))
            .await
            .unwrap();

        let reply = next(&mut replies).await;
        assert_eq!(reply.event_type(), USER_UPDATE_REPLY);
        assert_eq!(reply.correlation_id(), Some("c-2"));
        assert_eq!(reply.custom_header(REQUESTER_ID), Some("U1"));
        let body: UserReply = reply.payload_as().unwrap();
        assert!(body.success);
        assert_eq!(body.user.map(|u| u.name), Some("Ada Lovelace".to_string()));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_by_someone_else_is_refused() {
        let (runtime, bus) = started(CourierConfig::default()).await;
        runtime.directory().create(ada()).unwrap();
        runtime
            .directory()
            .create(User::new("U2", "grace", "grace@example.org"))
            .unwrap();
        let mut replies = bus.subscribe(EnvelopeFilter::event_types([USER_UPDATE_REPLY]));

        let hijack = User::new("U1", "ada", "grace@example.org");
        bus.publish(&request(USER_UPDATE_REQUEST, &hijack, "c-3", Some("U2")))
            .await
            .unwrap();

        let body: UserReply = next(&mut replies).await.payload_as().unwrap();
        assert!(!body.success);
        assert_eq!(runtime.directory().get("U1").unwrap().email, "ada@example.org");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_username_is_refused() {
        let (runtime, bus) = started(CourierConfig::default()).await;
        let mut replies = bus.subscribe(EnvelopeFilter::event_types([USER_CREATION_REPLY]));

        bus.publish(&request(USER_CREATION_REQUEST, &ada(), "c-4", None))
            .await
            .unwrap();
        let clash = User::new("U9", "ada", "imposter@example.org");
        bus.publish(&request(USER_CREATION_REQUEST, &clash, "c-5", None))
            .await
            .unwrap();

        let first: UserReply = next(&mut replies).await.payload_as().unwrap();
        let second = next(&mut replies).await;
        assert!(first.success);
        assert_eq!(second.correlation_id(), Some("c-5"));
        let second: UserReply = second.payload_as().unwrap();
        assert_eq!(second.reason.as_deref(), Some("Username ada is already taken"));
        assert_eq!(runtime.directory().len(), 1);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_service_announces_itself() {
        let mut config = CourierConfig::default();
        config.service_name = "user-service".to_string();
        config.transport.service_queue = "user-service.in".to_string();
        let mut runtime = CourierRuntime::new(config).unwrap();
        let mut technical = runtime
            .bus()
            .subscribe(EnvelopeFilter::category(Category::Technical));

        runtime.start().await.unwrap();

        let hello = next(&mut technical).await;
        assert_eq!(hello.event_type(), SERVICE_CONNECT);
        assert_eq!(hello.from(), "user-service");
        let payload: serde_json::Value = hello.payload_as().unwrap();
        assert_eq!(payload["queue"], "user-service.in");

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_dispatch() {
        let (runtime, bus) = started(CourierConfig::default()).await;
        let directory = runtime.directory();
        let gateway = runtime.gateway();
        runtime.shutdown().await;

        bus.publish(&request(USER_CREATION_REQUEST, &ada(), "c-6", None))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(directory.is_empty());
        assert_eq!(gateway.stats().received(), 0);
    }
}

//! # Envelope Flows
//!
//! Envelopes built in one service, carried as wire JSON over the bus and
//! read back in another.
//!
//! ## Flows Tested
//!
//! 1. **Builder → codec → bus → subscriber**: every header survives the hop
//! 2. **Relay**: a forwarding service re-stamps `from` and keeps the rest
//! 3. **Reply**: correlation id and category follow the request
//! 4. **Literal wire input** from a foreign producer decodes with defaults

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use courier_bus::{EnvelopeFilter, EnvelopePublisher, InMemoryEnvelopeBus, Subscription};
    use courier_envelope::headers::{ENTITY_ID, PROJECT_CONFIGURATION_ID, REQUESTER_ID};
    use courier_envelope::{decode, encode, Category, Envelope, EnvelopeBuilder, User};
    use serde_json::Value;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn full_envelope(payload: &str) -> Envelope {
        let mut builder = EnvelopeBuilder::new()
            .with_category(Category::Technical)
            .with_from("svc-a")
            .with_reply_to("svc-a.replies")
            .with_correlation_id("corr-1")
            .with_creation_date(1_480_978_336_019)
            .with_event_type("brick_state_updated")
            .with_ttl(30_000)
            .with_redelivery_count(2)
            .with_max_redelivery_count(5)
            .with_json_payload(payload);
        builder.add_custom_header(REQUESTER_ID, "U1").unwrap();
        builder.add_custom_header(ENTITY_ID, "E1").unwrap();
        builder.build().unwrap()
    }

    async fn next(sub: &mut Subscription) -> Envelope {
        timeout(Duration::from_millis(200), sub.recv())
            .await
            .expect("timeout")
            .expect("envelope")
    }

    // =============================================================================
    // ROUND TRIPS
    // =============================================================================

    #[tokio::test]
    async fn test_headers_survive_the_bus() {
        let bus = InMemoryEnvelopeBus::new();
        let mut sub = bus.subscribe(EnvelopeFilter::all());
        let sent = full_envelope(r#"{"state":"RUNNING","brick":{"name":"jenkins"}}"#);

        bus.publish(&sent).await.unwrap();
        let received = next(&mut sub).await;

        assert_eq!(received.header(), sent.header());
        let sent_payload: Value = serde_json::from_str(sent.payload()).unwrap();
        let received_payload: Value = serde_json::from_str(received.payload()).unwrap();
        assert_eq!(received_payload, sent_payload);
    }

    #[test]
    fn test_scalar_payloads_round_trip_verbatim() {
        for payload in ["abc", "", "42", "true", "null", r#""quoted""#, "{broken"] {
            let sent = full_envelope(payload);
            let received = decode(&encode(&sent).unwrap()).unwrap();
            assert_eq!(received.payload(), payload, "payload {payload:?}");
            assert_eq!(received.header(), sent.header());
        }
    }

    #[test]
    fn test_structured_payload_is_embedded() {
        let envelope = EnvelopeBuilder::new()
            .with_from("svc-a")
            .with_event_type("user_created")
            .with_payload(&User::new("U1", "ada", "ada@example.org"))
            .unwrap()
            .build()
            .unwrap();

        let wire: Value = serde_json::from_str(&encode(&envelope).unwrap()).unwrap();
        assert_eq!(wire["payload"]["username"], "ada");
        assert_eq!(wire["headers"]["category"], "BUSINESS");
        assert_eq!(wire["headers"]["maxRedeliveryCount"], -1);
        assert!(wire["headers"].get("replyTo").is_none());

        let back = decode(&wire.to_string()).unwrap();
        assert_eq!(back.payload_as::<User>().unwrap().username, "ada");
    }

    // =============================================================================
    // FOREIGN PRODUCERS
    // =============================================================================

    #[test]
    fn test_literal_wire_input() {
        let input = r#"{"version":"1.0.0","headers":{"category":"BUSINESS","from":"svcA","eventType":"user_creation_request","creationDate":1000,"custom":{}},"payload":"abc"}"#;

        let envelope = decode(input).unwrap();

        assert_eq!(envelope.from(), "svcA");
        assert_eq!(envelope.event_type(), "user_creation_request");
        assert_eq!(envelope.payload(), "abc");
        assert_eq!(envelope.redelivery_count(), 0);
        assert_eq!(envelope.max_redelivery_count(), -1);
        assert_eq!(envelope.creation_date(), 1000);
        assert!(envelope.custom().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_wire_text_reaches_subscribers() {
        let bus = InMemoryEnvelopeBus::new();
        let mut sub = bus.subscribe(EnvelopeFilter::event_types(["user_creation_request"]));

        bus.publish_raw("garbage");
        bus.publish_raw(
            r#"{"version":"1.0.0","headers":{"category":"BUSINESS","from":"svcA","eventType":"user_creation_request","creationDate":1000,"custom":{"requester_id":"U1","attempt":3}},"payload":["a","b"]}"#,
        );

        let envelope = next(&mut sub).await;
        assert_eq!(envelope.custom_header(REQUESTER_ID), Some("U1"));
        assert_eq!(envelope.custom_header("attempt"), Some("3"));
        assert_eq!(envelope.payload(), r#"["a","b"]"#);
    }

    // =============================================================================
    // RELAY & REPLY
    // =============================================================================

    #[tokio::test]
    async fn test_relay_restamps_origin() {
        let bus = InMemoryEnvelopeBus::new();
        let mut sub = bus.subscribe(EnvelopeFilter::all());
        let original = full_envelope(r#"{"n":1}"#);

        let relayed = EnvelopeBuilder::new()
            .with_from("svc-b")
            .relay(&original)
            .build()
            .unwrap();
        bus.publish(&relayed).await.unwrap();
        let received = next(&mut sub).await;

        assert_eq!(received.from(), "svc-b");
        assert_eq!(received.correlation_id(), original.correlation_id());
        assert_eq!(received.creation_date(), original.creation_date());
        assert_eq!(received.custom(), original.custom());
        assert_eq!(received.redelivery_count(), original.redelivery_count());
    }

    #[tokio::test]
    async fn test_relay_keeps_payload_numbers_and_key_order() {
        let bus = InMemoryEnvelopeBus::new();
        let mut sub = bus.subscribe(EnvelopeFilter::all());
        let payload = r#"{"total":98765432109876543210,"currency":"EUR","amount":19.990}"#;
        let original = full_envelope(payload);

        let relayed = EnvelopeBuilder::new()
            .with_from("svc-b")
            .relay(&original)
            .build()
            .unwrap();
        bus.publish(&relayed).await.unwrap();

        assert_eq!(next(&mut sub).await.payload(), payload);
    }

    #[test]
    fn test_reply_follows_request() {
        let request = full_envelope("ping");

        let mut builder = EnvelopeBuilder::new()
            .reply_to_envelope(&request)
            .with_from("svc-b")
            .with_event_type("brick_state_reply")
            .with_json_payload("pong");
        builder
            .copy_custom_header(&request, ENTITY_ID)
            .copy_custom_header(&request, PROJECT_CONFIGURATION_ID);
        let reply = builder.build().unwrap();

        assert_eq!(reply.category(), Category::Technical);
        assert_eq!(reply.correlation_id(), Some("corr-1"));
        assert!(reply.reply_to().is_none());
        assert_eq!(reply.custom_header(ENTITY_ID), Some("E1"));
        assert!(reply.custom_header(PROJECT_CONFIGURATION_ID).is_none());
        assert!(reply.custom_header(REQUESTER_ID).is_none());
        assert!(reply.creation_date() > 0);
    }

    #[test]
    fn test_missing_payload_builds_empty() {
        let envelope = EnvelopeBuilder::new()
            .with_from("x")
            .with_event_type("y")
            .build()
            .unwrap();
        assert_eq!(envelope.payload(), "");
        assert_eq!(envelope.category(), Category::Business);
    }
}

//! # Dispatch Flows
//!
//! Envelopes published on the bus, routed by a spawned gateway into an
//! in-process mailbox.
//!
//! ## Flows Tested
//!
//! 1. **Routing**: matched event types reach the handler exactly once
//! 2. **Requester enrichment** through the runtime's user directory
//! 3. **Isolation**: a bad envelope never stops the receive loop
//! 4. **User routes**: gateway + user service mappings

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use courier_bus::{
        DispatchGateway, EnvelopeFilter, EnvelopePublisher, HandlerAddress, InMemoryEnvelopeBus,
        MappingRegistry, ResolveError, SendError, UserResolver,
    };
    use courier_envelope::event_types::{USER_CREATION_REQUEST, USER_UPDATE_REQUEST};
    use courier_envelope::headers::REQUESTER_ID;
    use courier_envelope::{Envelope, EnvelopeBuilder, User};
    use courier_runtime::{user_routes, UserCommand, UserDirectory};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// What the mapping saw.
    #[derive(Debug, Clone, PartialEq)]
    struct Seen {
        event_type: String,
        requester: Option<User>,
    }

    /// Handler address that records every message.
    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<Seen>>,
    }

    impl HandlerAddress<Seen> for Recorder {
        fn send(&self, message: Seen) -> Result<(), SendError> {
            self.messages.lock().push(message);
            Ok(())
        }
    }

    /// Resolver that fails for one identifier and delegates the rest.
    struct Flaky {
        inner: Arc<UserDirectory>,
        broken: &'static str,
    }

    #[async_trait]
    impl UserResolver for Flaky {
        async fn resolve(&self, identifier: &str) -> Result<Option<User>, ResolveError> {
            if identifier == self.broken {
                return Err(ResolveError::Unavailable("store offline".into()));
            }
            self.inner.resolve(identifier).await
        }
    }

    fn record_routes() -> MappingRegistry<Seen> {
        let record = |envelope: &Envelope, requester: Option<&User>| {
            Some(Seen {
                event_type: envelope.event_type().to_string(),
                requester: requester.cloned(),
            })
        };
        MappingRegistry::new()
            .with_route("project_created", record)
            .with_route("brick_updated", record)
    }

    fn envelope(event_type: &str, requester: Option<&str>) -> Envelope {
        let mut builder = EnvelopeBuilder::new()
            .with_from("svc-a")
            .with_event_type(event_type)
            .with_json_payload(r#"{"id":1}"#);
        if let Some(id) = requester {
            builder.add_custom_header(REQUESTER_ID, id).unwrap();
        }
        builder.build().unwrap()
    }

    fn directory() -> Arc<UserDirectory> {
        let directory = Arc::new(UserDirectory::new());
        directory
            .create(User::new("U1", "ada", "ada@example.org"))
            .unwrap();
        directory
    }

    async fn settle(recorder: &Recorder, expected: usize) {
        timeout(Duration::from_millis(500), async {
            while recorder.messages.lock().len() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages delivered");
    }

    // =============================================================================
    // ROUTING & ENRICHMENT
    // =============================================================================

    #[tokio::test]
    async fn test_routes_and_enriches_over_the_bus() {
        let bus = InMemoryEnvelopeBus::new();
        let recorder = Arc::new(Recorder::default());
        let gateway = Arc::new(DispatchGateway::<Seen>::new(
            recorder.clone(),
            directory(),
            record_routes(),
        ));
        let handle = gateway.clone().spawn(bus.subscribe(EnvelopeFilter::all()));

        bus.publish(&envelope("project_created", Some("U1"))).await.unwrap();
        bus.publish(&envelope("unrouted", Some("U1"))).await.unwrap();
        bus.publish(&envelope("brick_updated", None)).await.unwrap();

        settle(&recorder, 2).await;
        handle.unsubscribe().await;

        let seen = recorder.messages.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].event_type, "project_created");
        assert_eq!(seen[0].requester.as_ref().map(|u| u.username.as_str()), Some("ada"));
        assert_eq!(seen[1].event_type, "brick_updated");
        assert!(seen[1].requester.is_none());

        assert_eq!(gateway.stats().received(), 3);
        assert_eq!(gateway.stats().forwarded(), 2);
        assert_eq!(gateway.stats().dropped(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_envelope() {
        let bus = InMemoryEnvelopeBus::new();
        let recorder = Arc::new(Recorder::default());
        let resolver = Arc::new(Flaky {
            inner: directory(),
            broken: "U-broken",
        });
        let gateway = Arc::new(DispatchGateway::<Seen>::new(
            recorder.clone(),
            resolver,
            record_routes(),
        ));
        let handle = gateway.clone().spawn(bus.subscribe(EnvelopeFilter::all()));

        bus.publish_raw("{ definitely not an envelope");
        bus.publish(&envelope("project_created", Some("U-broken")))
            .await
            .unwrap();
        bus.publish(&envelope("project_created", Some("U1"))).await.unwrap();

        settle(&recorder, 2).await;
        handle.unsubscribe().await;

        let seen = recorder.messages.lock().clone();
        assert!(seen[0].requester.is_none());
        assert_eq!(seen[1].requester.as_ref().map(|u| u.identifier.as_str()), Some("U1"));
        assert_eq!(gateway.stats().resolve_failures(), 1);
    }

    #[tokio::test]
    async fn test_mapping_sees_exactly_the_published_envelope() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let routes = MappingRegistry::new()
            .with_route("project_created", |e: &Envelope, _: Option<&User>| Some(e.clone()));
        let gateway = DispatchGateway::new(Arc::new(tx), directory(), routes);

        let sent = envelope("project_created", None);
        let outcome = gateway.dispatch_wire(&sent.to_json().unwrap()).await;

        assert!(outcome.is_forwarded());
        assert_eq!(rx.try_recv().unwrap(), sent);
        assert!(rx.try_recv().is_err());
    }

    // =============================================================================
    // USER ROUTES
    // =============================================================================

    #[tokio::test]
    async fn test_user_routes_through_gateway() {
        let (tx, mut rx) = mpsc::unbounded_channel::<UserCommand>();
        let gateway = DispatchGateway::new(Arc::new(tx), directory(), user_routes());

        let mut update = EnvelopeBuilder::new()
            .with_from("web")
            .with_event_type(USER_UPDATE_REQUEST)
            .with_payload(&User::new("U1", "ada", "ada@example.org").with_name("Ada"))
            .unwrap();
        update.add_custom_header(REQUESTER_ID, "U1").unwrap();
        let update = update.build().unwrap();

        assert!(gateway.dispatch(&update).await.is_forwarded());
        match rx.try_recv().unwrap() {
            UserCommand::Update { requester, user, .. } => {
                assert_eq!(requester.map(|u| u.identifier), Some("U1".to_string()));
                assert_eq!(user.name, "Ada");
            }
            other => panic!("unexpected command {other:?}"),
        }

        let bogus = EnvelopeBuilder::new()
            .with_from("web")
            .with_event_type(USER_CREATION_REQUEST)
            .with_json_payload("[1,2,3]")
            .build()
            .unwrap();
        assert!(!gateway.dispatch(&bogus).await.is_forwarded());
        assert!(rx.try_recv().is_err());
    }
}

//! # Registry and Reverse-Call Scenarios
//!
//! | Scenario | Flow |
//! |----------|------|
//! | A | Listener registered for `svc.demo` receives group-created byte for byte |
//! | B | Declared count 5 with 3 parameters is rejected before any handler runs |
//! | C | Transient callbacks of request 42 are gone after finish |
//! | D | Reverse call into a free slot is a silent no-op |
//! | E | Death of a listener's object drops its record and slot |

#[cfg(test)]
mod tests {
    use crate::fixtures::{wait_for, AuthScript, Harness};
    use devauth_sdk::{DataChangeListener, DeviceAuthCallback};
    use devauth_service::CallbackKey;
    use devauth_transport::{CallMode, CallerInfo, MessageParcel};
    use devauth_types::framing::write_request;
    use devauth_types::{
        result_code, CallbackId, CallbackType, HookId, MethodId, ParamTag, ParamWriter, ReplyFraming, SlotHandle,
        DEV_AUTH_CALL_REQUEST, DEVICE_AUTH_INTERFACE_TOKEN,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const APP: &str = "svc.demo";

    // =========================================================================
    // SCENARIO A
    // =========================================================================

    #[tokio::test]
    async fn test_listener_receives_group_created_verbatim() {
        let h = Harness::start().unwrap();
        let client = h.client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client
            .register_data_change_listener(
                APP,
                DataChangeListener::new().with_group_created(move |info| {
                    let _ = tx.send(info.to_string());
                }),
            )
            .await
            .unwrap();
        assert_eq!(h.group_manager.calls(), vec![format!("register_listener:{APP}")]);

        let listener = h.group_manager.listener().unwrap();
        listener.on_group_created("{\"groupId\":\"g1\"}").await;

        let received = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(received.as_bytes(), b"{\"groupId\":\"g1\"}");
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_listener() {
        let h = Harness::start().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut clients = Vec::new();
        for app in ["svc.a", "svc.b"] {
            let client = h.client();
            let tx = tx.clone();
            client
                .register_data_change_listener(
                    app,
                    DataChangeListener::new().with_trusted_device_num_changed(move |n| {
                        let _ = tx.send((app, n));
                    }),
                )
                .await
                .unwrap();
            clients.push(client);
        }

        h.service.invoker().on_trusted_device_num_changed(3).await;

        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![("svc.a", 3), ("svc.b", 3)]);
    }

    // =========================================================================
    // SCENARIO B
    // =========================================================================

    #[tokio::test]
    async fn test_overstated_param_count_never_reaches_handler() {
        let h = Harness::start().unwrap();
        let mut body = ParamWriter::new();
        body.push_i32(ParamTag::OsAccountId, 0).unwrap();
        body.push_i64(ParamTag::ReqId, 1).unwrap();
        body.push_str(ParamTag::AppId, APP).unwrap();
        let (body, count) = body.into_parts();
        assert_eq!(count, 3);

        let frame = write_request(MethodId::CreateGroup.as_i32(), 5, &body).unwrap();
        let parcel = MessageParcel::new(DEVICE_AUTH_INTERFACE_TOKEN, CallerInfo::default(), frame);
        let reply = h
            .service
            .remote_object()
            .send_request(
                DEV_AUTH_CALL_REQUEST,
                parcel,
                CallMode::Sync {
                    timeout: Duration::from_secs(1),
                },
            )
            .await
            .unwrap()
            .unwrap();

        let (code, body) = ReplyFraming::Standard.read_reply(&reply.data).unwrap();
        assert_eq!(code, result_code::IPC_BAD_PARAM_NUM);
        assert!(body.is_none());
        assert!(h.group_manager.calls().is_empty());
    }

    // =========================================================================
    // SCENARIO C
    // =========================================================================

    #[tokio::test]
    async fn test_transient_callbacks_removed_after_finish() {
        let h = Harness::start().unwrap();
        let client = h.client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = DeviceAuthCallback::new()
            .with_finish(move |req, op, data| {
                let _ = tx.send((req, op, data.to_string()));
            })
            .with_error(|_, _, _, _| {});

        client.auth_process_data(42, b"hello", callback).await.unwrap();

        let (req, op, data) = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!((req, op), (42, 0));
        assert_eq!(data, "{\"result\":\"ok\"}");
        assert!(h
            .service
            .registry()
            .lookup(&CallbackKey::Request(42), CallbackType::TmpDevAuth)
            .is_none());
        assert!(wait_for(|| client.pending_requests() == 0).await);
        assert!(wait_for(|| client.hooks().is_empty()).await);
        assert_eq!(h.group_auth.calls(), vec!["ga_process_data:42:5".to_string()]);
    }

    #[tokio::test]
    async fn test_full_exchange_reaches_every_callback() {
        let h = Harness::with_config(crate::fixtures::test_config(), AuthScript::FullExchange).unwrap();
        let client = h.client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let key_tx = tx.clone();
        let finish_tx = tx.clone();
        let callback = DeviceAuthCallback::new()
            .with_transmit(|_, data| data == b"{}")
            .with_session_key(move |_, key| {
                let _ = key_tx.send(format!("key:{}", key.len()));
            })
            .with_finish(move |_, _, _| {
                let _ = finish_tx.send("finish".to_string());
            });

        client.auth_device(0, 7, "{}", callback).await.unwrap();

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let mut events = vec![first, second];
        events.sort();
        assert_eq!(events, vec!["finish".to_string(), "key:16".to_string()]);
        assert_eq!(h.group_auth.transmit_accepted(), vec![true]);
        assert!(!h
            .service
            .registry()
            .contains(&CallbackKey::Request(7), CallbackType::TmpDevAuth));
    }

    #[tokio::test]
    async fn test_error_path_removes_transient_record() {
        let h = Harness::with_config(crate::fixtures::test_config(), AuthScript::Fail(9)).unwrap();
        let client = h.client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let callback = DeviceAuthCallback::new().with_error(move |req, _, code, info| {
            let _ = tx.send((req, code, info.map(str::to_string)));
        });

        client.auth_process_data(5, b"x", callback).await.unwrap();

        let delivered = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(delivered, (5, 9, None));
        assert!(h.service.registry().is_empty());
        assert!(wait_for(|| client.pending_requests() == 0).await);
    }

    #[tokio::test]
    async fn test_rejected_request_leaves_nothing_behind() {
        let h = Harness::with_config(crate::fixtures::test_config(), AuthScript::Reject(result_code::ERROR)).unwrap();
        let client = h.client();
        let result = client
            .auth_process_data(6, b"x", DeviceAuthCallback::new().with_finish(|_, _, _| {}))
            .await;
        assert_eq!(result.unwrap_err().code(), result_code::ERROR);
        assert!(h.service.registry().is_empty());
        assert_eq!(h.service.registry().slots_in_use(), 0);
        assert_eq!(client.pending_requests(), 0);
    }

    // =========================================================================
    // SCENARIO D
    // =========================================================================

    #[tokio::test]
    async fn test_reverse_call_into_free_slot_is_noop() {
        let h = Harness::start().unwrap();
        let client = h.client();
        client
            .register_data_change_listener(APP, DataChangeListener::new().with_group_deleted(|_| {}))
            .await
            .unwrap();
        let records = h.service.registry().len();

        let reply = h
            .service
            .invoker()
            .invoke(
                SlotHandle::new(7, 1),
                CallbackId::OnGroupDeleted,
                HookId::new(1).unwrap(),
                ParamWriter::new(),
            )
            .await;

        assert!(reply.is_none());
        assert_eq!(h.service.registry().len(), records);
        assert_eq!(h.service.registry().slots_in_use(), 1);
    }

    // =========================================================================
    // SCENARIO E
    // =========================================================================

    #[tokio::test]
    async fn test_listener_death_drops_record_and_slot() {
        let h = Harness::start().unwrap();
        let client = h.client();
        client
            .register_data_change_listener(APP, DataChangeListener::new().with_group_created(|_| {}))
            .await
            .unwrap();
        let registry = h.service.registry();
        assert!(registry.contains(&CallbackKey::app(APP), CallbackType::Listener));
        assert_eq!(registry.slots_in_use(), 1);

        client.shutdown();

        assert!(!registry.contains(&CallbackKey::app(APP), CallbackType::Listener));
        assert_eq!(registry.slots_in_use(), 0);
    }

    #[tokio::test]
    async fn test_transient_records_do_not_follow_object_death() {
        let h = Harness::with_config(crate::fixtures::test_config(), AuthScript::Pending).unwrap();
        let client = h.client();
        client
            .auth_process_data(11, b"x", DeviceAuthCallback::new().with_finish(|_, _, _| {}))
            .await
            .unwrap();

        client.shutdown();
        assert!(h
            .service
            .registry()
            .contains(&CallbackKey::Request(11), CallbackType::TmpDevAuth));

        h.service.shutdown(&h.locator).unwrap();
        assert!(h.service.registry().is_empty());
        assert_eq!(h.service.registry().slots_in_use(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_and_death() {
        let h = Harness::start().unwrap();
        let registry = Arc::clone(h.service.registry());
        let mut tasks = Vec::new();
        for i in 0..4 {
            let client = Arc::new(h.client());
            tasks.push(tokio::spawn(async move {
                let app = format!("svc.{i}");
                client
                    .register_data_change_listener(&app, DataChangeListener::new().with_group_created(|_| {}))
                    .await
                    .unwrap();
                client
                    .register_callback(&app, DeviceAuthCallback::new().with_finish(|_, _, _| {}))
                    .await
                    .unwrap();
                client.shutdown();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(registry.is_empty());
        assert_eq!(registry.slots_in_use(), 0);
    }
}

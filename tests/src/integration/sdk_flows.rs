//! # Client Operation Flows
//!
//! Every [`DeviceAuthClient`](devauth_sdk::DeviceAuthClient) operation
//! against a published service, checking what reaches the business layer
//! and what comes back.

#[cfg(test)]
mod tests {
    use crate::fixtures::{test_config, AuthScript, Harness};
    use devauth_sdk::{DataChangeListener, DeviceAuthCallback, QueryResult, SdkError};
    use devauth_service::CallbackKey;
    use devauth_types::{result_code, CallbackType};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const APP: &str = "svc.demo";

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    #[tokio::test]
    async fn test_callback_registration_lifecycle() {
        let h = Harness::start().unwrap();
        let client = h.client();
        client
            .register_callback(APP, DeviceAuthCallback::new().with_finish(|_, _, _| {}))
            .await
            .unwrap();
        assert!(h
            .service
            .registry()
            .contains(&CallbackKey::app(APP), CallbackType::DevAuth));

        client.unregister_callback(APP).await.unwrap();
        assert!(!h
            .service
            .registry()
            .contains(&CallbackKey::app(APP), CallbackType::DevAuth));
        assert_eq!(
            h.group_manager.calls(),
            vec![format!("register_callback:{APP}"), format!("unregister_callback:{APP}")]
        );
        assert!(client.hooks().is_empty());
    }

    #[tokio::test]
    async fn test_reregistration_replaces_record_and_frees_old_slot() {
        let h = Harness::start().unwrap();
        let client = h.client();
        for _ in 0..3 {
            client
                .register_data_change_listener(APP, DataChangeListener::new().with_group_created(|_| {}))
                .await
                .unwrap();
        }
        assert_eq!(h.service.registry().len(), 1);
        assert_eq!(h.service.registry().slots_in_use(), 1);
        assert_eq!(client.hooks().len(), 1);

        client.unregister_data_change_listener(APP).await.unwrap();
        assert!(h.service.registry().is_empty());
        assert_eq!(h.service.registry().slots_in_use(), 0);
    }

    #[tokio::test]
    async fn test_business_rejection_of_registration() {
        let h = Harness::start().unwrap();
        h.group_manager.set_result(result_code::NOT_SUPPORT);
        let client = h.client();
        let result = client
            .register_callback(APP, DeviceAuthCallback::new().with_finish(|_, _, _| {}))
            .await;
        assert_eq!(result, Err(SdkError::Business(result_code::NOT_SUPPORT)));
        assert!(client.hooks().is_empty());
        assert!(h.service.registry().is_empty());
        assert_eq!(h.service.registry().slots_in_use(), 0);

        let result = client
            .register_data_change_listener(APP, DataChangeListener::new().with_group_created(|_| {}))
            .await;
        assert_eq!(result, Err(SdkError::Business(result_code::NOT_SUPPORT)));
        assert!(h.service.registry().is_empty());
        assert_eq!(h.service.registry().slots_in_use(), 0);
    }

    #[tokio::test]
    async fn test_registry_capacity_reported_to_client() {
        let mut config = test_config();
        config.max_callbacks = 1;
        let h = Harness::with_config(config, AuthScript::Pending).unwrap();
        let client = h.client();
        client
            .register_callback("svc.a", DeviceAuthCallback::new().with_finish(|_, _, _| {}))
            .await
            .unwrap();
        let result = client
            .register_callback("svc.b", DeviceAuthCallback::new().with_finish(|_, _, _| {}))
            .await;
        assert_eq!(result, Err(SdkError::ProcFailed));
        assert_eq!(h.service.registry().slots_in_use(), 1);
    }

    // =========================================================================
    // GROUP MUTATIONS
    // =========================================================================

    #[tokio::test]
    async fn test_group_mutations_reach_business_layer() {
        let h = Harness::start().unwrap();
        let client = h.client();
        client.create_group(100, 1, APP, "{\"groupName\":\"g\"}").await.unwrap();
        client.delete_group(100, 2, APP, "{\"groupId\":\"g1\"}").await.unwrap();
        client.add_member_to_group(100, 3, APP, "{\"pinCode\":\"1\"}").await.unwrap();
        client.delete_member_from_group(100, 4, APP, "{\"deleteId\":\"d\"}").await.unwrap();
        client.process_data(5, &[1, 2, 3]).await.unwrap();

        assert_eq!(
            h.group_manager.calls(),
            vec![
                format!("create_group:100:1:{APP}:{{\"groupName\":\"g\"}}"),
                format!("delete_group:100:2:{APP}:{{\"groupId\":\"g1\"}}"),
                format!("add_member:100:3:{APP}:{{\"pinCode\":\"1\"}}"),
                format!("delete_member:100:4:{APP}:{{\"deleteId\":\"d\"}}"),
                "gm_process_data:5:3".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_business_result_passes_through() {
        let h = Harness::start().unwrap();
        h.group_manager.set_result(0x1234);
        let client = h.client();
        assert_eq!(
            client.create_group(0, 1, APP, "{}").await,
            Err(SdkError::Business(0x1234))
        );
        assert_eq!(
            client.check_access_to_group(0, APP, "g1").await,
            Err(SdkError::Business(0x1234))
        );
    }

    #[tokio::test]
    async fn test_group_op_binds_request_for_on_request() {
        let h = Harness::start().unwrap();
        let client = h.client();
        client
            .register_callback(
                APP,
                DeviceAuthCallback::new().with_request(|req, op, _| Some(format!("{{\"confirm\":{req},\"op\":{op}}}"))),
            )
            .await
            .unwrap();
        client.add_member_to_group(0, 21, APP, "{}").await.unwrap();

        let callbacks = h.group_manager.auth_callbacks().unwrap();
        let answer = callbacks.on_request(21, 3, None).await;
        assert_eq!(answer.as_deref(), Some("{\"confirm\":21,\"op\":3}"));
        assert_eq!(
            h.service.registry().lookup(&CallbackKey::app(APP), CallbackType::DevAuth).unwrap().request_id,
            Some(21)
        );
    }

    #[tokio::test]
    async fn test_on_request_binds_through_app_id_field() {
        let h = Harness::start().unwrap();
        let client = h.client();
        client
            .register_callback(APP, DeviceAuthCallback::new().with_request(|_, _, info| info.map(str::to_string)))
            .await
            .unwrap();
        let callbacks = h.group_manager.auth_callbacks().unwrap();

        let params = format!("{{\"appId\":\"{APP}\",\"peer\":\"x\"}}");
        assert_eq!(callbacks.on_request(77, 1, Some(&params)).await, Some(params.clone()));

        // No appId to bind through.
        assert_eq!(callbacks.on_request(78, 1, Some("{\"peer\":\"x\"}")).await, None);
        assert_eq!(callbacks.on_request(79, 1, Some("not json")).await, None);
    }

    #[tokio::test]
    async fn test_persistent_callbacks_survive_finish() {
        let h = Harness::start().unwrap();
        let client = h.client();
        let (tx, mut rx) = mpsc::unbounded_channel();
        client
            .register_callback(
                APP,
                DeviceAuthCallback::new().with_finish(move |req, _, data| {
                    let _ = tx.send((req, data.to_string()));
                }),
            )
            .await
            .unwrap();
        client.create_group(0, 8, APP, "{}").await.unwrap();

        let callbacks = h.group_manager.auth_callbacks().unwrap();
        callbacks.on_finish(8, 0, "{\"groupId\":\"g8\"}").await;

        let delivered = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(delivered, (8, "{\"groupId\":\"g8\"}".to_string()));
        assert!(h
            .service
            .registry()
            .contains(&CallbackKey::app(APP), CallbackType::DevAuth));
        assert_eq!(client.hooks().len(), 1);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[tokio::test]
    async fn test_string_queries() {
        let h = Harness::start().unwrap();
        let client = h.client();
        assert_eq!(
            client.process_credential(2, "{\"deviceId\":\"d\"}").await.unwrap(),
            "{\"operationCode\":2}"
        );
        assert_eq!(
            client.get_register_info("{\"version\":\"1\"}").await.unwrap(),
            "{\"version\":\"1.0.0\",\"deviceId\":\"local\"}"
        );
        assert_eq!(
            client.get_group_info_by_id(0, APP, "g1").await.unwrap(),
            "{\"groupId\":\"g1\"}"
        );
        assert_eq!(
            client.get_device_info_by_id(0, APP, "peer", "g1").await.unwrap(),
            "{\"udid\":\"peer\"}"
        );
    }

    #[tokio::test]
    async fn test_list_queries() {
        let h = Harness::start().unwrap();
        let client = h.client();
        assert_eq!(
            client.get_pk_info_list(0, APP, "{}").await.unwrap(),
            QueryResult {
                info: "[{\"pk\":\"0a0b\"}]".to_string(),
                count: 1
            }
        );
        assert_eq!(client.get_group_info(0, APP, "{}").await.unwrap().count, 2);
        assert_eq!(client.get_joined_groups(0, APP, 256).await.unwrap().count, 1);
        assert_eq!(
            client.get_related_groups(0, APP, "peer").await.unwrap(),
            QueryResult {
                info: "[]".to_string(),
                count: 0
            }
        );
        assert_eq!(
            client.get_trusted_devices(0, APP, "g1").await.unwrap().info,
            "[{\"udid\":\"a\"},{\"udid\":\"b\"}]"
        );
        assert!(h
            .group_manager
            .calls()
            .contains(&format!("get_joined_groups:{APP}:256")));
    }

    #[tokio::test]
    async fn test_failed_queries() {
        let h = Harness::start().unwrap();
        h.group_manager.set_result(result_code::JSON_GET);
        let client = h.client();
        assert_eq!(
            client.get_trusted_devices(0, APP, "g1").await,
            Err(SdkError::Business(result_code::JSON_GET))
        );
        assert_eq!(
            client.get_group_info_by_id(0, APP, "g1").await,
            Err(SdkError::Business(result_code::JSON_GET))
        );
        assert_eq!(client.get_register_info("{}").await, Err(SdkError::BadParam));
    }

    #[tokio::test]
    async fn test_device_membership() {
        let h = Harness::start().unwrap();
        let client = h.client();
        assert!(client.is_device_in_group(0, APP, "g1", "member").await);
        assert!(!client.is_device_in_group(0, APP, "g1", "stranger").await);
        assert!(!client.is_device_in_group(0, APP, "g1", "").await);
    }

    // =========================================================================
    // CLIENT SIDE FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_stopped_service_is_unavailable() {
        let h = Harness::start().unwrap();
        let client = h.client();
        h.service.shutdown(&h.locator).unwrap();
        assert_eq!(
            client.get_group_info(0, APP, "{}").await,
            Err(SdkError::ServiceUnavailable)
        );
        assert_eq!(client.unregister_callback(APP).await, Ok(()));
    }

    #[tokio::test]
    async fn test_caller_not_allowed() {
        let mut config = test_config();
        config.allowed_uids = vec![1000];
        let h = Harness::with_config(config, AuthScript::Pending).unwrap();
        let client = h.client();
        assert_eq!(client.create_group(0, 1, APP, "{}").await, Err(SdkError::ProcFailed));
        assert!(h.group_manager.calls().is_empty());

        let mut allowed = h.client_config();
        allowed.caller.uid = 1000;
        let client = devauth_sdk::DeviceAuthClient::new(allowed, Arc::clone(&h.locator));
        client.create_group(0, 1, APP, "{}").await.unwrap();
    }

    #[tokio::test]
    async fn test_interface_token_mismatch() {
        let h = Harness::start().unwrap();
        let mut config = h.client_config();
        config.interface_token = "other.IMethodsIpcCall".to_string();
        let client = devauth_sdk::DeviceAuthClient::new(config, Arc::clone(&h.locator));
        assert_eq!(client.delete_group(0, 1, APP, "{}").await, Err(SdkError::ProcFailed));
    }
}

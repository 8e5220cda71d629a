//! # Wire-Level Behavior
//!
//! Raw parcels against the published service object, plus the Lite
//! transport profile end to end.

#[cfg(test)]
mod tests {
    use crate::fixtures::{test_config, AuthScript, Harness};
    use devauth_sdk::{DeviceAuthCallback, SdkError};
    use devauth_service::CallbackKey;
    use devauth_transport::{Backend, CallMode, CallerInfo, MessageParcel};
    use devauth_types::framing::write_request;
    use devauth_types::{
        encode_param, result_code, CallbackType, DevAuthHooks, HookId, MethodId, ParamList, ParamTag, ParamWriter,
        ReplyFraming, SlotHandle, DEV_AUTH_CALL_REQUEST, DEVICE_AUTH_INTERFACE_TOKEN, LITE_STAGING_CAPACITY,
    };
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const APP: &str = "svc.demo";

    fn lite_config() -> devauth_service::ServiceConfig {
        devauth_service::ServiceConfig {
            backend: Backend::Lite,
            ..test_config()
        }
    }

    fn app_params(app_id: &str) -> ParamWriter {
        let mut writer = ParamWriter::new();
        writer.push_str(ParamTag::AppId, app_id).unwrap();
        writer
    }

    async fn send_raw(h: &Harness, code: u32, parcel: MessageParcel) -> MessageParcel {
        h.service
            .remote_object()
            .send_request(
                code,
                parcel,
                CallMode::Sync {
                    timeout: Duration::from_secs(1),
                },
            )
            .await
            .unwrap()
            .unwrap()
    }

    fn parcel(method: MethodId, writer: &ParamWriter, caller: CallerInfo) -> MessageParcel {
        let frame = write_request(method.as_i32(), writer.count(), writer.as_bytes()).unwrap();
        MessageParcel::new(DEVICE_AUTH_INTERFACE_TOKEN, caller, frame)
    }

    fn code_of(reply: &MessageParcel) -> i32 {
        ReplyFraming::Standard.read_reply(&reply.data).unwrap().0
    }

    // =========================================================================
    // LITE PROFILE
    // =========================================================================

    #[tokio::test]
    async fn test_lite_backend_end_to_end() {
        let h = Harness::with_config(lite_config(), AuthScript::Finish).unwrap();
        let client = h.client();
        assert_eq!(client.config().backend, Backend::Lite);

        client.create_group(0, 1, APP, "{\"groupName\":\"g\"}").await.unwrap();
        assert_eq!(client.get_trusted_devices(0, APP, "g1").await.unwrap().count, 2);
        assert_eq!(client.get_group_info_by_id(0, APP, "g1").await.unwrap(), "{\"groupId\":\"g1\"}");

        let (tx, mut rx) = mpsc::unbounded_channel();
        client
            .auth_process_data(
                3,
                b"lite",
                DeviceAuthCallback::new().with_finish(move |req, _, data| {
                    let _ = tx.send((req, data.to_string()));
                }),
            )
            .await
            .unwrap();
        let delivered = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(delivered, (3, "{\"result\":\"ok\"}".to_string()));
    }

    #[tokio::test]
    async fn test_lite_staging_bound_fails_before_send() {
        let h = Harness::with_config(lite_config(), AuthScript::Pending).unwrap();
        let client = h.client();
        let oversized = format!("{{\"groupName\":\"{}\"}}", "x".repeat(LITE_STAGING_CAPACITY));

        assert_eq!(
            client.create_group(0, 1, APP, &oversized).await,
            Err(SdkError::BuildParam)
        );
        assert_eq!(
            client.process_data(2, &vec![0u8; LITE_STAGING_CAPACITY + 1]).await,
            Err(SdkError::BuildParam)
        );
        assert!(h.group_manager.calls().is_empty());
    }

    #[tokio::test]
    async fn test_standard_backend_has_no_staging_bound() {
        let h = Harness::start().unwrap();
        let client = h.client();
        let large = format!("{{\"groupName\":\"{}\"}}", "x".repeat(LITE_STAGING_CAPACITY));
        client.create_group(0, 1, APP, &large).await.unwrap();
        assert_eq!(h.group_manager.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_lite_reply_framing_on_raw_parcel() {
        let h = Harness::with_config(lite_config(), AuthScript::Pending).unwrap();
        let reply = send_raw(
            &h,
            DEV_AUTH_CALL_REQUEST,
            parcel(MethodId::UnregCallback, &app_params(APP), CallerInfo::default()),
        )
        .await;

        let (code, body) = ReplyFraming::Lite.read_reply(&reply.data).unwrap();
        assert_eq!(code, result_code::SUCCESS);
        let params = ParamList::decode_prefix(body.unwrap());
        assert_eq!(params.get_i32(ParamTag::IpcResult), Ok(result_code::SUCCESS));
    }

    // =========================================================================
    // REQUEST VALIDATION
    // =========================================================================

    #[tokio::test]
    async fn test_interface_token_mismatch_on_raw_parcel() {
        let h = Harness::start().unwrap();
        let mut request = parcel(MethodId::UnregCallback, &app_params(APP), CallerInfo::default());
        request.interface_token = "other.Interface".to_string();

        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, request).await;
        assert_eq!(code_of(&reply), result_code::IPC_BAD_MESSAGE);
        assert!(h.group_manager.calls().is_empty());
    }

    #[tokio::test]
    async fn test_caller_allow_list() {
        let h = Harness::with_config(
            devauth_service::ServiceConfig {
                allowed_uids: vec![1000],
                ..test_config()
            },
            AuthScript::Pending,
        )
        .unwrap();

        let denied = CallerInfo { uid: 2000, pid: 9 };
        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, parcel(MethodId::UnregCallback, &app_params(APP), denied)).await;
        assert_eq!(code_of(&reply), result_code::IPC_PERMISSION_DENIED);
        assert!(h.group_manager.calls().is_empty());

        let allowed = CallerInfo { uid: 1000, pid: 9 };
        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, parcel(MethodId::UnregCallback, &app_params(APP), allowed)).await;
        assert_eq!(code_of(&reply), result_code::SUCCESS);
        assert_eq!(h.group_manager.calls(), vec![format!("unregister_callback:{APP}")]);
    }

    #[tokio::test]
    async fn test_unknown_opcode_and_method() {
        let h = Harness::start().unwrap();
        let reply = send_raw(&h, 42, parcel(MethodId::UnregCallback, &app_params(APP), CallerInfo::default())).await;
        assert_eq!(code_of(&reply), result_code::IPC_UNKNOWN_OPCODE);

        let frame = write_request(999, 0, &[]).unwrap();
        let request = MessageParcel::new(DEVICE_AUTH_INTERFACE_TOKEN, CallerInfo::default(), frame);
        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, request).await;
        assert_eq!(code_of(&reply), result_code::IPC_METHOD_INVALID);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_bad_message() {
        let h = Harness::start().unwrap();
        let request = MessageParcel::new(DEVICE_AUTH_INTERFACE_TOKEN, CallerInfo::default(), vec![1, 0, 0]);
        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, request).await;
        assert_ne!(code_of(&reply), result_code::SUCCESS);
        assert!(h.group_manager.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wire_supplied_callback_object_rejected() {
        let h = Harness::start().unwrap();
        let mut writer = app_params(APP);
        let hooks = DevAuthHooks {
            on_finish: HookId::new(1),
            ..Default::default()
        };
        writer.push(ParamTag::DevAuthCb, Some(&hooks.encode())).unwrap();
        let mut body = writer.as_bytes().to_vec();
        encode_param(&mut body, ParamTag::CbObject.as_i32(), Some(&SlotHandle::new(0, 1).to_bytes())).unwrap();
        let frame = write_request(MethodId::RegCallback.as_i32(), writer.count() + 1, &body).unwrap();
        let request = MessageParcel::new(DEVICE_AUTH_INTERFACE_TOKEN, CallerInfo::default(), frame);

        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, request).await;
        assert_eq!(code_of(&reply), result_code::IPC_BAD_PARAM);
        assert!(h.group_manager.calls().is_empty());
        assert!(!h
            .service
            .registry()
            .contains(&CallbackKey::app(APP), CallbackType::DevAuth));
        assert_eq!(h.service.registry().slots_in_use(), 0);
    }

    #[tokio::test]
    async fn test_registration_without_object_is_rejected() {
        let h = Harness::start().unwrap();
        let mut writer = app_params(APP);
        let hooks = DevAuthHooks {
            on_finish: HookId::new(1),
            ..Default::default()
        };
        writer.push(ParamTag::DevAuthCb, Some(&hooks.encode())).unwrap();

        let reply = send_raw(&h, DEV_AUTH_CALL_REQUEST, parcel(MethodId::RegCallback, &writer, CallerInfo::default())).await;
        assert_eq!(code_of(&reply), result_code::IPC_BAD_PARAM);
        assert!(h.service.registry().is_empty());
    }
}

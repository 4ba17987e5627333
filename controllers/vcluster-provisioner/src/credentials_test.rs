//! Unit tests for credential retrieval

#[cfg(test)]
mod tests {
    use crate::credentials::*;
    use crate::error::ProvisionError;
    use crate::kubeconfig::{parse, servers};
    use crate::test_utils::*;
    use host_client::MockHostClient;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const NS: &str = "vcluster-demo";

    fn retriever(mock: &MockHostClient) -> CredentialRetriever {
        CredentialRetriever::new(Arc::new(mock.clone()), fast_policy())
    }

    #[tokio::test]
    async fn test_connect_output_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_connect(Err("vcluster not ready"));
        mock.push_connect(Ok(SAMPLE_KUBECONFIG));

        let doc = retriever(&mock)
            .fetch("demo", NS, false, &output, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(doc, SAMPLE_KUBECONFIG.as_bytes());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), SAMPLE_KUBECONFIG);
        assert!(output.ends_with(".vcluster/demo/kubeconfig.yaml"));
        assert_eq!(mock.call_count("connect_virtual_cluster"), 2);
        assert_eq!(mock.call_count("get_secret_config"), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_secret() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_connect(Err("connection refused"));
        mock.push_secret(NS, None);
        mock.push_secret(NS, Some(""));
        mock.push_secret(NS, Some(&encode(SAMPLE_KUBECONFIG)));

        let doc = retriever(&mock)
            .fetch("demo", NS, false, &output, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(doc, SAMPLE_KUBECONFIG.as_bytes());
        assert_eq!(mock.call_count("get_secret_config"), 3);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_undecodable_secret_keeps_polling() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_secret(NS, Some("%%% not base64 %%%"));
        mock.push_secret(NS, Some(&encode(SAMPLE_KUBECONFIG)));

        let doc = retriever(&mock)
            .fetch("demo", NS, false, &output, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(doc, SAMPLE_KUBECONFIG.as_bytes());
    }

    #[tokio::test]
    async fn test_both_sources_failing_times_out_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_connect(Err("connection refused"));

        let err = retriever(&mock)
            .fetch("demo", NS, false, &output, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::CredentialTimeout(ref name) if name == "demo"));
        assert!(!output.exists());
        assert!(mock.call_count("connect_virtual_cluster") > 1);
        assert!(mock.call_count("get_secret_config") > 1);
    }

    #[tokio::test]
    async fn test_external_rewrites_server() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_connect(Ok(SAMPLE_KUBECONFIG));
        mock.push_service(NS, load_balancer_service(None, 443));
        mock.push_service(NS, load_balancer_service(Some("203.0.113.5"), 443));

        let doc = retriever(&mock)
            .fetch("demo", NS, true, &output, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(servers(&parse(&doc).unwrap()), vec!["https://203.0.113.5"]);
        assert_eq!(std::fs::read(&output).unwrap(), doc);
    }

    #[tokio::test]
    async fn test_external_without_ingress_keeps_document() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_connect(Ok(SAMPLE_KUBECONFIG));
        mock.push_service(NS, load_balancer_service(None, 443));

        let doc = retriever(&mock)
            .fetch("demo", NS, true, &output, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(doc, SAMPLE_KUBECONFIG.as_bytes());
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_cancelled_fetch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = kubeconfig_path(dir.path(), "demo");
        let mock = MockHostClient::new();
        mock.push_connect(Err("connection refused"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = retriever(&mock)
            .fetch("demo", NS, false, &output, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Cancelled(_)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_live_fetch_prefers_connect() {
        let mock = MockHostClient::new();
        mock.push_connect(Ok(SAMPLE_KUBECONFIG));
        mock.push_service(NS, cluster_ip_service());

        let doc = retriever(&mock).fetch_live("demo", NS).await.unwrap();
        assert_eq!(doc, SAMPLE_KUBECONFIG.as_bytes());
        assert_eq!(mock.call_count("connect_virtual_cluster"), 1);
        assert_eq!(mock.call_count("get_secret_config"), 0);
    }

    #[tokio::test]
    async fn test_live_fetch_reads_secret_once() {
        let mock = MockHostClient::new();
        mock.push_connect(Err("not running"));
        mock.push_secret(NS, Some(&encode(SAMPLE_KUBECONFIG)));
        mock.push_service(NS, load_balancer_service(Some("198.51.100.7"), 8443));

        let doc = retriever(&mock).fetch_live("demo", NS).await.unwrap();
        assert_eq!(servers(&parse(&doc).unwrap()), vec!["https://198.51.100.7:8443"]);
        assert_eq!(mock.call_count("connect_virtual_cluster"), 1);
        assert_eq!(mock.call_count("get_secret_config"), 1);
    }

    #[tokio::test]
    async fn test_live_fetch_of_missing_cluster_is_unavailable() {
        let mock = MockHostClient::new();
        let err = retriever(&mock).fetch_live("ghost", "vcluster-ghost").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_live_fetch_of_empty_secret_is_unavailable() {
        let mock = MockHostClient::new();
        mock.push_secret(NS, Some(""));
        let err = retriever(&mock).fetch_live("demo", NS).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Unavailable(_)));
    }
}

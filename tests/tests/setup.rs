use mock_service::MockConfig;
use revload::lifecycle::setup;
use revload::ReqwestClient;
use revload_core::default_teams;

#[tracing_test::traced_test]
#[tokio::test]
async fn setup_logs_every_seed_team() {
    let addr = mock_service::spawn(MockConfig::default()).await.unwrap();
    let client = ReqwestClient::new(&format!("http://{addr}")).unwrap();

    let teams = setup(&client, default_teams()).await;
    assert_eq!(teams, default_teams());
    assert!(logs_contain("Created team backend: 201"));
    assert!(logs_contain("Created team frontend: 201"));

    // Seeding again is tolerated even though the teams already exist.
    let teams = setup(&client, default_teams()).await;
    assert_eq!(teams, default_teams());
    assert!(logs_contain("Created team backend: 400"));
}

//! Mock construction helpers

use chromagraph::options::Options;
use chromagraph::pipeline::{
    Blob, Capability, ConnectorDecl, ConnectorPattern, NodeId, PixelAccessTicket, PlugId, Session,
};
use mockall::mock;

mock! {
    pub Filter {}

    impl Capability for Filter {
        fn registration(&self) -> String;
        fn plugs(&self) -> Vec<ConnectorDecl>;
        fn sockets(&self) -> Vec<ConnectorDecl>;
        fn options(&self) -> Options;
        fn context_type(&self) -> Option<String>;
        fn produce_context(&self, session: &Session, node: NodeId) -> anyhow::Result<Blob>;
        fn run(
            &self,
            session: &mut Session,
            node: NodeId,
            plug: PlugId,
            ticket: &mut PixelAccessTicket,
        ) -> anyhow::Result<()>;
    }
}

/// Mock with one `type_path` plug and socket. `run` and `produce_context`
/// are left for the test to set up.
pub fn mock_filter(registration: &str, type_path: &str, context_type: Option<&str>) -> MockFilter {
    let mut mock = MockFilter::new();
    mock.expect_registration()
        .return_const(registration.to_string());
    let plug = type_path.to_string();
    mock.expect_plugs()
        .returning(move || vec![ConnectorDecl::fixed(ConnectorPattern::plug(plug.clone()))]);
    let socket = type_path.to_string();
    mock.expect_sockets()
        .returning(move || vec![ConnectorDecl::fixed(ConnectorPattern::socket(socket.clone()))]);
    mock.expect_options().returning(Options::new);
    let context_type = context_type.map(str::to_string);
    mock.expect_context_type()
        .returning(move || context_type.clone());
    mock
}

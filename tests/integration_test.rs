use bytes::Bytes;
use slog::Drain;
use std::error::Error;
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};
use topic_raft::{
    CommitStream, InProcessNetwork, Node, NodeConfig, NodeId, RaftNode, RaftOptions, ReadError, StateKind, Term,
    WriteError, CONTROL_NAMESPACE,
};

struct TestCluster {
    network: InProcessNetwork,
    nodes: Vec<RaftNode>,
}

impl TestCluster {
    fn start(num_members: usize, port_base: u16) -> Result<Self, Box<dyn Error>> {
        let network = InProcessNetwork::new();
        let members: Vec<Node> = (0..num_members).map(|i| member_info(port_base, i)).collect();

        let mut nodes = Vec::with_capacity(num_members);
        for member in members.iter() {
            let node = topic_raft::try_create_node(NodeConfig {
                node_id: member.id.clone(),
                cluster_members: members.clone(),
                logger: create_root_logger_for_stdout(member.id.to_string()),
                options: fast_options(),
                messenger: network.messenger_for(member.id.clone()),
            })?;
            network.register(&node);
            nodes.push(node);
        }

        Ok(TestCluster { network, nodes })
    }

    fn node(&self, node_id: &NodeId) -> &RaftNode {
        self.nodes
            .iter()
            .find(|node| node.node_id() == node_id)
            .expect("Unknown node")
    }

    fn leaders(&self) -> Vec<(NodeId, Term)> {
        self.nodes
            .iter()
            .map(|node| (node.node_id().clone(), node.event_listener().current_election_state()))
            .filter(|(_, state)| state.role == StateKind::Leader)
            .map(|(node_id, state)| (node_id, state.term))
            .collect()
    }

    /// Waits for a leader in a term newer than `after_term`, ignoring `excluded`.
    async fn discover_leader(&self, after_term: Term, excluded: Option<&NodeId>, timeout: Duration) -> (NodeId, Term) {
        let deadline = Instant::now() + timeout;
        loop {
            let leader = self
                .leaders()
                .into_iter()
                .filter(|(node_id, term)| Some(node_id) != excluded && *term > after_term)
                .max_by_key(|(_, term)| *term);
            if let Some(leader) = leader {
                return leader;
            }

            assert!(Instant::now() < deadline, "Timeout waiting for leader election");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn subscribe_everywhere(&self, namespace: &str, timeout: Duration) -> Vec<(NodeId, CommitStream)> {
        let mut streams = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.iter() {
            let deadline = Instant::now() + timeout;
            let stream = loop {
                if let Some(stream) = node.subscribe_commits(namespace) {
                    break stream;
                }
                assert!(Instant::now() < deadline, "{} never learned about {}", node.node_id(), namespace);
                tokio::time::sleep(Duration::from_millis(10)).await;
            };
            streams.push((node.node_id().clone(), stream));
        }

        streams
    }

    async fn shutdown(&self) {
        for node in self.nodes.iter() {
            let _ = node.shutdown().await;
        }
    }
}

#[tokio::test]
async fn leader_election() -> Result<(), Box<dyn Error>> {
    let cluster = TestCluster::start(5, 3000)?;

    let (leader_id, term) = cluster
        .discover_leader(Term::new(0), None, Duration::from_secs(10))
        .await;
    assert!(term >= Term::new(1));

    // Followers redirect, eventually naming the leader.
    let deadline = Instant::now() + Duration::from_secs(5);
    for follower in cluster.nodes.iter().filter(|node| node.node_id() != &leader_id) {
        loop {
            match follower.write("orders", Bytes::new()).await {
                Err(WriteError::NotLeader {
                    known_leader: Some(known_leader),
                }) if known_leader == leader_id => break,
                Err(WriteError::NotLeader { .. }) => {}
                other => panic!("Unexpected write result on follower: {:?}", other),
            }
            assert!(Instant::now() < deadline, "Follower never learned the leader");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    // The announcement commits, so every node ends up knowing the leader.
    for node in cluster.nodes.iter() {
        while node.known_leader().as_ref() != Some(&leader_id) {
            assert!(Instant::now() < deadline, "{} never saw the announcement", node.node_id());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn single_node_cluster_commits_alone() -> Result<(), Box<dyn Error>> {
    let cluster = TestCluster::start(1, 3100)?;
    let (leader_id, _) = cluster
        .discover_leader(Term::new(0), None, Duration::from_secs(5))
        .await;
    let leader = cluster.node(&leader_id);

    leader.create_topic("solo").await?;
    let mut streams = cluster.subscribe_everywhere("solo", Duration::from_secs(5)).await;
    let output = leader.write("solo", Bytes::from_static(b"only me")).await?;

    let committed = next_commit(&mut streams[0].1).await;
    assert_eq!(committed.index, output.index);
    assert_eq!(committed.data, Bytes::from_static(b"only me"));

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn topics_replicate_independently() -> Result<(), Box<dyn Error>> {
    let cluster = TestCluster::start(3, 3200)?;
    let (leader_id, _) = cluster
        .discover_leader(Term::new(0), None, Duration::from_secs(10))
        .await;
    let leader = cluster.node(&leader_id);

    // Writing to a topic nobody created fails.
    assert!(matches!(
        leader.write("orders", Bytes::from_static(b"early")).await,
        Err(WriteError::UnknownTopic(_))
    ));

    leader.create_topic("orders").await?;
    leader.create_topic("payments").await?;
    let mut orders = cluster.subscribe_everywhere("orders", Duration::from_secs(5)).await;
    let mut payments = cluster.subscribe_everywhere("payments", Duration::from_secs(5)).await;

    // Every node agrees on the generated ids.
    let orders_id = leader.topic("orders").unwrap().id().clone();
    for node in cluster.nodes.iter() {
        assert_eq!(node.topic("orders").unwrap().id(), &orders_id);
    }

    let mut written = Vec::new();
    for i in 0..5u8 {
        written.push(leader.write("orders", Bytes::from(vec![i])).await?);
    }
    let payment = leader.write("payments", Bytes::from_static(b"$")).await?;

    // Each topic has its own index space.
    assert_eq!(payment.index, topic_raft::Index::new(1));
    assert_eq!(written[0].index, topic_raft::Index::new(1));

    for (node_id, stream) in orders.iter_mut() {
        for (i, output) in written.iter().enumerate() {
            let committed = next_commit(stream).await;
            assert_eq!(committed.index, output.index, "Out of order commit on {}", node_id);
            assert_eq!(committed.term, output.term);
            assert_eq!(committed.data, Bytes::from(vec![i as u8]));
        }
    }
    for (_, stream) in payments.iter_mut() {
        assert_eq!(next_commit(stream).await.data, Bytes::from_static(b"$"));
    }

    // Committed entries can be read back through the leader only.
    let read = leader.read("orders", written[2].index).await?;
    assert_eq!(read.map(|entry| entry.data), Some(Bytes::from(vec![2u8])));
    for follower in cluster.nodes.iter().filter(|node| node.node_id() != &leader_id) {
        assert!(matches!(
            follower.read("orders", written[2].index).await,
            Err(ReadError::NotLeader { .. })
        ));
    }

    // Deleting a topic removes it everywhere, and the control topic can't be touched.
    leader.delete_topic("payments").await?;
    let deadline = Instant::now() + Duration::from_secs(5);
    for node in cluster.nodes.iter() {
        while node.topic("payments").is_some() {
            assert!(Instant::now() < deadline, "{} never deleted the topic", node.node_id());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    assert!(matches!(
        leader.delete_topic(CONTROL_NAMESPACE).await,
        Err(WriteError::ProtectedTopic(_))
    ));
    assert!(matches!(
        leader.write(CONTROL_NAMESPACE, Bytes::new()).await,
        Err(WriteError::ProtectedTopic(_))
    ));

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn new_leader_takes_over_after_partition() -> Result<(), Box<dyn Error>> {
    let cluster = TestCluster::start(3, 3300)?;
    let (old_leader_id, old_term) = cluster
        .discover_leader(Term::new(0), None, Duration::from_secs(10))
        .await;

    cluster.node(&old_leader_id).create_topic("orders").await?;
    let mut streams = cluster.subscribe_everywhere("orders", Duration::from_secs(5)).await;
    let first = cluster
        .node(&old_leader_id)
        .write("orders", Bytes::from_static(b"before"))
        .await?;
    for (_, stream) in streams.iter_mut() {
        assert_eq!(next_commit(stream).await.index, first.index);
    }

    cluster.network.isolate(&old_leader_id);
    let (new_leader_id, new_term) = cluster
        .discover_leader(old_term, Some(&old_leader_id), Duration::from_secs(10))
        .await;
    assert_ne!(new_leader_id, old_leader_id);
    assert!(new_term > old_term);

    // Once reachable again, the old leader sees the newer term and steps down.
    cluster.network.heal(&old_leader_id);
    let old_leader = cluster.node(&old_leader_id);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let state = old_leader.event_listener().current_election_state();
        if state.role == StateKind::Follower && state.term >= new_term {
            break;
        }
        assert!(Instant::now() < deadline, "Old leader never stepped down");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let second = cluster
        .node(&new_leader_id)
        .write("orders", Bytes::from_static(b"after"))
        .await?;
    assert_eq!(second.index, first.index.plus(1));
    for (_, stream) in streams.iter_mut() {
        let committed = next_commit(stream).await;
        assert_eq!(committed.index, second.index);
        assert_eq!(committed.data, Bytes::from_static(b"after"));
    }

    cluster.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn stopped_leader_goes_silent() -> Result<(), Box<dyn Error>> {
    let cluster = TestCluster::start(3, 3400)?;
    let (leader_id, _) = cluster
        .discover_leader(Term::new(0), None, Duration::from_secs(10))
        .await;

    // Heartbeats are flowing.
    let before = cluster.network.dispatch_count(&leader_id);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cluster.network.dispatch_count(&leader_id) > before);

    cluster.node(&leader_id).shutdown().await?;
    let at_shutdown = cluster.network.dispatch_count(&leader_id);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cluster.network.dispatch_count(&leader_id), at_shutdown);

    // Stopping twice reports the node as gone.
    assert!(cluster.node(&leader_id).shutdown().await.is_err());

    cluster.shutdown().await;
    Ok(())
}

async fn next_commit(stream: &mut CommitStream) -> topic_raft::CommittedEntry {
    tokio::time::timeout(Duration::from_secs(5), stream.recv())
        .await
        .expect("Timeout waiting for commit")
        .expect("Commit stream closed")
}

fn fast_options() -> RaftOptions {
    RaftOptions {
        broadcast_interval: Some(Duration::from_millis(20)),
        election_min_timeout: Some(Duration::from_millis(150)),
        election_max_timeout: Some(Duration::from_millis(300)),
        rpc_timeout: Some(Duration::from_millis(50)),
        ..RaftOptions::default()
    }
}

fn member_info(port_base: u16, id: usize) -> Node {
    Node::new(
        NodeId::new(repl_id(id)),
        SocketAddr::from(([127, 0, 0, 1], port_base + id as u16)),
    )
}

fn repl_id(id: usize) -> String {
    format!("replica-{}", id + 1)
}

fn create_root_logger_for_stdout(replica_id: String) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("ReplicaId" => replica_id))
}

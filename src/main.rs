use bytes::Bytes;
use slog::Drain;
use std::error::Error;
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};
use topic_raft::{InProcessNetwork, Node, NodeConfig, NodeId, RaftNode, RaftOptions, StateKind, WriteError};

const NUM_NODES: usize = 3;
const NAMESPACE: &str = "greetings";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let logger = create_root_logger_for_stdout();
    let network = InProcessNetwork::new();

    let members: Vec<Node> = (0..NUM_NODES)
        .map(|i| Node::new(node_id(i), SocketAddr::from(([127, 0, 0, 1], 7000 + i as u16))))
        .collect();

    let mut nodes = Vec::with_capacity(NUM_NODES);
    for member in members.iter() {
        let node = topic_raft::try_create_node(NodeConfig {
            node_id: member.id.clone(),
            cluster_members: members.clone(),
            logger: logger.clone(),
            options: RaftOptions::default(),
            messenger: network.messenger_for(member.id.clone()),
        })?;
        network.register(&node);
        nodes.push(node);
    }

    let leader = wait_for_leader(&nodes, Duration::from_secs(10)).await?;
    slog::info!(logger, "Leader is {}", leader.node_id());

    leader.create_topic(NAMESPACE).await?;
    let mut streams = Vec::with_capacity(NUM_NODES);
    for node in nodes.iter() {
        let stream = wait_for_topic(node, NAMESPACE, Duration::from_secs(5)).await?;
        streams.push((node.node_id().clone(), stream));
    }

    for greeting in ["hello", "hola", "bonjour"].iter() {
        let output = leader.write(NAMESPACE, Bytes::from_static(greeting.as_bytes())).await?;
        slog::info!(logger, "Wrote {:?} at {:?}", greeting, output);
    }

    for (node_id, stream) in streams.iter_mut() {
        for _ in 0..3 {
            let committed = tokio::time::timeout(Duration::from_secs(5), stream.recv())
                .await?
                .ok_or("Commit stream closed")?;
            println!(
                "{} committed #{:?} (term {:?}): {}",
                node_id,
                committed.index,
                committed.term,
                String::from_utf8_lossy(&committed.data)
            );
        }
    }

    for node in nodes.iter() {
        node.shutdown().await?;
    }

    Ok(())
}

fn node_id(i: usize) -> NodeId {
    NodeId::new(format!("node-{}", i + 1))
}

async fn wait_for_leader(nodes: &[RaftNode], timeout: Duration) -> Result<&RaftNode, Box<dyn Error>> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        for node in nodes.iter() {
            if node.event_listener().current_election_state().role == StateKind::Leader {
                return Ok(node);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    Err("No leader elected".into())
}

async fn wait_for_topic(
    node: &RaftNode,
    namespace: &str,
    timeout: Duration,
) -> Result<topic_raft::CommitStream, Box<dyn Error>> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(stream) = node.subscribe_commits(namespace) {
            return Ok(stream);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    Err(Box::new(WriteError::UnknownTopic(namespace.to_string())))
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}

//! In-process console simulator backing the integration tests.
//!
//! Listens on a loopback TCP port, parses client traffic with the real
//! codec, and answers data and definition requests from a scripted node
//! store. Meter subscriptions are answered with UDP datagrams from a
//! scripted plan. Unsolicited responses can be injected at any time.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use wing_protocol::{
    encode_meter_datagram, encode_response, Constraints, Event, NodeDef, NodeId, NodeType,
    NodeUnit, NodeValue, Response, StreamDecoder,
};

/// One scripted meter datagram. A `request_id` of `None` echoes the id of
/// the subscription that triggered it.
pub struct MeterFrame {
    pub request_id: Option<u16>,
    pub levels: Vec<i16>,
}

/// A fader-style float node for test stores.
pub fn fader(id: NodeId) -> NodeDef {
    NodeDef {
        id,
        parent_id: 1,
        index: 1,
        node_type: NodeType::FaderLevel,
        unit: NodeUnit::Decibels,
        name: "fdr".into(),
        long_name: "Fader".into(),
        read_only: false,
        constraints: Constraints::Float { min: -144.0, max: 10.0, steps: 1441 },
    }
}

/// A free-form string node for test stores.
pub fn label(id: NodeId) -> NodeDef {
    NodeDef {
        id,
        parent_id: 1,
        index: 2,
        node_type: NodeType::String,
        unit: NodeUnit::None,
        name: "name".into(),
        long_name: "Name".into(),
        read_only: false,
        constraints: Constraints::String { max_len: 16 },
    }
}

pub struct SimConsole {
    addr: SocketAddr,
    inject_tx: Mutex<mpsc::Sender<Response>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimConsole {
    pub fn start(nodes: Vec<(NodeDef, NodeValue)>) -> Self {
        Self::start_with(nodes, Vec::new())
    }

    pub fn start_with(nodes: Vec<(NodeDef, NodeValue)>, meter_plan: Vec<MeterFrame>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (inject_tx, inject_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || run(listener, nodes, meter_plan, inject_rx, flag));
        Self {
            addr,
            inject_tx: Mutex::new(inject_tx),
            shutdown,
            handle: Some(handle),
        }
    }

    /// `host:port` the client should connect to.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    /// Push an unsolicited response to the connected client.
    pub fn inject(&self, resp: Response) {
        self.inject_tx.lock().unwrap().send(resp).unwrap();
    }
}

impl Drop for SimConsole {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    listener: TcpListener,
    nodes: Vec<(NodeDef, NodeValue)>,
    meter_plan: Vec<MeterFrame>,
    inject_rx: mpsc::Receiver<Response>,
    shutdown: Arc<AtomicBool>,
) {
    listener.set_nonblocking(true).unwrap();
    let stream = loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        match listener.accept() {
            Ok((stream, _)) => break stream,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => panic!("accept failed: {e}"),
        }
    };
    stream.set_nonblocking(false).unwrap();
    stream.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
    serve(stream, nodes, meter_plan, inject_rx, shutdown);
}

fn serve(
    mut stream: TcpStream,
    nodes: Vec<(NodeDef, NodeValue)>,
    meter_plan: Vec<MeterFrame>,
    inject_rx: mpsc::Receiver<Response>,
    shutdown: Arc<AtomicBool>,
) {
    let order: Vec<NodeId> = nodes.iter().map(|(def, _)| def.id).collect();
    let mut store: HashMap<NodeId, (NodeDef, NodeValue)> =
        nodes.into_iter().map(|(def, value)| (def.id, (def, value))).collect();
    let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut decoder = StreamDecoder::new();
    let mut buf = [0u8; 4096];

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        while let Ok(resp) = inject_rx.try_recv() {
            send(&mut stream, &resp);
        }
        match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => decoder.feed(&buf[..n]),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(_) => return,
        }
        loop {
            match decoder.next_event() {
                Ok(Some(event)) => {
                    let node = decoder.current_node();
                    handle(event, node, &order, &mut store, &mut stream, &udp, &meter_plan);
                }
                Ok(None) => break,
                Err(e) => panic!("client sent malformed bytes: {e}"),
            }
        }
    }
}

fn handle(
    event: Event,
    node: NodeId,
    order: &[NodeId],
    store: &mut HashMap<NodeId, (NodeDef, NodeValue)>,
    stream: &mut TcpStream,
    udp: &UdpSocket,
    meter_plan: &[MeterFrame],
) {
    match event {
        Event::Response(Response::NodeData { id, value }) => {
            if let Some(entry) = store.get_mut(&id) {
                entry.1 = value;
            }
        }
        Event::DataRequest => {
            if node == 0 {
                for id in order {
                    let (_, value) = &store[id];
                    send(stream, &Response::NodeData { id: *id, value: value.clone() });
                }
            } else if let Some((_, value)) = store.get(&node) {
                send(stream, &Response::NodeData { id: node, value: value.clone() });
            }
            send(stream, &Response::RequestEnd);
        }
        Event::DefinitionRequest => {
            if node == 0 {
                for id in order {
                    let (def, _) = &store[id];
                    send(stream, &Response::NodeDef(def.clone()));
                }
            } else if let Some((def, _)) = store.get(&node) {
                send(stream, &Response::NodeDef(def.clone()));
            }
            send(stream, &Response::RequestEnd);
        }
        Event::MeterSubscribe { request_id, port, meters } => {
            let target = SocketAddr::from(([127, 0, 0, 1], port));
            if meter_plan.is_empty() {
                let levels: Vec<i16> = (0..meters.len()).map(|i| (i as i16 + 1) * 100).collect();
                udp.send_to(&encode_meter_datagram(request_id, &levels), target).unwrap();
            } else {
                for frame in meter_plan {
                    let id = frame.request_id.unwrap_or(request_id);
                    udp.send_to(&encode_meter_datagram(id, &frame.levels), target).unwrap();
                }
            }
        }
        _ => {}
    }
}

fn send(stream: &mut TcpStream, resp: &Response) {
    stream.write_all(&encode_response(resp).unwrap()).unwrap();
}

//! The slot-aligned event loop.
//!
//! A single cooperative task multiplexes the console's UDP telemetry, the
//! operator's stdin commands and a sub-second tick. Decoded CQs flow to
//! the writer thread; once per transmit slot the selector pipeline picks a
//! candidate and a Reply goes back to the console. Per-packet failures are
//! logged and the loop keeps running; only bind errors are fatal.
use std::net::SocketAddr;
use std::time::Duration;

use chrono::{Timelike, Utc};
use rand::Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::config::Controller;
use crate::message::{self, Message};
use crate::packet::parser::Parser;
use crate::packet::{
    halt_tx, millis_since_midnight, modifiers, qso_logged, reply, status, Mode, Packet,
    SerializablePacket,
};
use crate::selector::{Pipeline, Selected};
use crate::store::{get_band, Command, Envelope, Status};
use crate::store::writer::CqCall;

const FT8_SLOTS: &[u32] = &[2, 17, 32, 47];
const FT4_SLOTS: &[u32] = &[0, 6, 12, 18, 24, 30, 36, 42, 48, 54];
const SELECT_TIMEOUT: Duration = Duration::from_millis(700);
const MAX_DATAGRAM: usize = 1024;

/// Seconds-of-minute at which a transmission may start.
pub fn slot_table(mode: Mode) -> &'static [u32] {
    match mode {
        Mode::Ft8 => FT8_SLOTS,
        Mode::Ft4 => FT4_SLOTS,
    }
}

/// Build the Reply echoing the stored decode envelope back to the console.
fn reply_from(envelope: &Envelope, follow_frequency: bool) -> reply::Packet {
    reply::Packet {
        time: millis_since_midnight(envelope.time),
        snr: envelope.snr,
        delta_time: envelope.delta_time,
        delta_frequency: envelope.delta_frequency,
        mode: envelope.mode.clone(),
        message: envelope.message.clone(),
        modifiers: if follow_frequency {
            modifiers::SHIFT
        } else {
            modifiers::NONE
        },
        ..reply::Packet::default()
    }
}

#[derive(Default)]
struct State {
    peer: Option<SocketAddr>,
    tx_status: bool,
    frequency: u64,
    pause: bool,
    current: Option<String>,
    sequence: &'static [u32],
    retries: u32,
    last_tx_message: Option<String>,
}

enum Control {
    Continue,
    Quit,
}

pub struct Sequencer {
    socket: UdpSocket,
    queue: UnboundedSender<Command>,
    pipeline: Pipeline,
    my_call: String,
    follow_frequency: bool,
    tx_retries: u32,
    tx_power: Option<u32>,
    logger: Option<(UdpSocket, SocketAddr)>,
}

impl Sequencer {
    pub async fn new(
        config: &Controller,
        queue: UnboundedSender<Command>,
        pipeline: Pipeline,
    ) -> crate::Result<Sequencer> {
        let socket = UdpSocket::bind((config.wsjt_ip.as_str(), config.wsjt_port)).await?;
        info!("listening for the console on {}", socket.local_addr()?);

        let logger = match (&config.logger_ip, config.logger_port) {
            (Some(ip), Some(port)) => {
                let addr = tokio::net::lookup_host((ip.as_str(), port))
                    .await?
                    .next()
                    .ok_or_else(|| {
                        std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("logger host {ip} did not resolve"),
                        )
                    })?;
                let socket = UdpSocket::bind("0.0.0.0:0").await?;
                Some((socket, addr))
            }
            _ => None,
        };

        Ok(Sequencer {
            socket,
            queue,
            pipeline,
            my_call: config.my_call.to_uppercase(),
            follow_frequency: config.follow_frequency,
            tx_retries: config.tx_retries,
            tx_power: config.tx_power,
            logger,
        })
    }

    pub async fn run(mut self) -> crate::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut state = State::default();

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((n, src)) => {
                        state.peer = Some(src);
                        self.handle_datagram(&mut state, &buf[..n], src).await;
                    }
                    Err(err) => error!("udp receive: {err}"),
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Control::Quit = self.handle_command(&mut state, &line) {
                            return Ok(());
                        }
                    }
                    // stdin closed; keep serving the socket
                    Ok(None) => tokio::time::sleep(SELECT_TIMEOUT).await,
                    Err(err) => warn!("stdin: {err}"),
                },
                _ = tokio::time::sleep(SELECT_TIMEOUT) => {}
            }

            if !state.pause && !state.tx_status {
                let second = Utc::now().second();
                if state.sequence.contains(&second) {
                    self.try_slot(&mut state).await;
                    // one selection per slot second
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn handle_command(&mut self, state: &mut State, line: &str) -> Control {
        let line = line.trim().to_uppercase();
        if line.is_empty() {
            return Control::Continue;
        }
        if line == "QUIT" {
            return Control::Quit;
        }
        if line.contains("HELP") || line.contains('?') {
            info!("the commands are: QUIT, CACHE, PAUSE, RUN, SELECTOR or HELP");
        } else if line == "PAUSE" {
            warn!("paused...");
            state.pause = true;
        } else if line == "RUN" {
            warn!("run...");
            state.pause = false;
        } else if line == "SELECTOR" || line == "SELECTORS" {
            warn!("selectors: {}", self.pipeline.names().join(", "));
        } else if line == "CACHE" {
            info!("{}", self.pipeline.cache_stats());
        } else {
            warn!("unknown command: {line}");
        }
        Control::Continue
    }

    async fn handle_datagram(&mut self, state: &mut State, data: &[u8], src: SocketAddr) {
        let packet = match Packet::parse(data) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("dropping datagram from {src}: {err}");
                return;
            }
        };
        match packet {
            Packet::Heartbeat(_) | Packet::LoggedAdif(_) => {}
            Packet::Status(status) => self.handle_status(state, &status).await,
            Packet::Decode(decode) => {
                let message = decode.message.clone().unwrap_or_default();
                self.handle_message(state, &message, &decode, src).await;
            }
            Packet::QsoLogged(qso) => {
                self.handle_logged(&qso).await;
                state.current = None;
            }
            other => debug!("ignoring {:?} packet", other.kind()),
        }
    }

    async fn handle_status(&mut self, state: &mut State, status: &status::Packet) {
        if let Some(mode) = status.tx_mode() {
            state.sequence = slot_table(mode);
        }
        state.frequency = status.frequency;
        state.tx_status = status.transmitting || status.tx_enabled;

        // a station that never answers would otherwise be called forever
        if status.transmitting && !status.decoding {
            if state.last_tx_message.is_some() && status.tx_message == state.last_tx_message {
                state.retries += 1;
                if state.retries >= self.tx_retries {
                    warn!(
                        "no answer from {} after {} calls, halting",
                        status.dx_call.as_deref().unwrap_or("?"),
                        state.retries
                    );
                    if let Some(peer) = state.peer {
                        self.send(halt_tx::Packet::immediate().into(), peer).await;
                    }
                    state.retries = 0;
                    state.last_tx_message = None;
                }
            } else {
                state.retries = 0;
                state.last_tx_message = status.tx_message.clone();
            }
        }

        if status.transmitting {
            if let Some(dx_call) = status.dx_call.as_deref().filter(|call| !call.is_empty()) {
                self.enqueue(Command::Status {
                    call: dx_call.to_string(),
                    status: Status::Replying,
                    band: get_band(state.frequency),
                });
            }
        }
        debug!(
            "{:?} => tx: {}, tx enabled: {} - watchdog: {}",
            status.dx_call, status.transmitting, status.tx_enabled, status.tx_watchdog
        );
    }

    async fn handle_message(
        &mut self,
        state: &mut State,
        message: &str,
        decode: &crate::packet::decode::Packet,
        src: SocketAddr,
    ) {
        match message::parse(message) {
            Some(Message::Reply { to, call }) => {
                // someone beat us to the station we are calling
                if state.current.as_deref() == Some(call.as_str()) && to != self.my_call {
                    info!("stop transmit: {call} replying to {to}");
                    self.send(halt_tx::Packet::immediate().into(), src).await;
                    self.enqueue(Command::Delete {
                        call,
                        band: get_band(state.frequency),
                    });
                }
            }
            Some(Message::Cq { call, extra, grid }) => {
                self.enqueue(Command::Insert(CqCall {
                    call,
                    extra,
                    grid,
                    frequency: state.frequency,
                    band: get_band(state.frequency),
                    packet: Envelope::from(decode),
                }));
            }
            None => debug!("unmatched: {message}"),
        }
    }

    async fn handle_logged(&mut self, qso: &qso_logged::Packet) {
        self.forward_to_logger(qso).await;
        if let Some(dx_call) = qso.dx_call.as_deref().filter(|call| !call.is_empty()) {
            self.enqueue(Command::Status {
                call: dx_call.to_string(),
                status: Status::Logged,
                band: get_band(qso.dial_frequency),
            });
        }
        info!(
            "** logged call: {}, grid: {}, mode: {}",
            qso.dx_call.as_deref().unwrap_or("?"),
            qso.dx_grid.as_deref().unwrap_or("?"),
            qso.mode.as_deref().unwrap_or("?")
        );
    }

    /// Re-emit the logged QSO to the upstream logging receiver, with the
    /// comments tagged and the TX power normalized.
    async fn forward_to_logger(&mut self, qso: &qso_logged::Packet) {
        let Some((socket, addr)) = &self.logger else {
            return;
        };
        let mut forwarded = qso.clone();
        let power = self
            .tx_power
            .unwrap_or_else(|| rand::thread_rng().gen_range(11..=17));
        forwarded.tx_power = Some(power.to_string());
        forwarded.comments = Some(format!(
            "[ft8ctrl] {}",
            qso.comments.as_deref().unwrap_or("")
        ));

        let mut buf = [0u8; MAX_DATAGRAM];
        match forwarded.serialize(&mut buf) {
            Ok(n) => {
                if let Err(err) = socket.send_to(&buf[..n as usize], addr).await {
                    error!("logger send: {err}");
                }
            }
            Err(err) => error!("logger packet: {err}"),
        }
    }

    async fn try_slot(&mut self, state: &mut State) {
        let band = get_band(state.frequency);
        match self.pipeline.select(band) {
            Ok(Some(selected)) => {
                let Some(peer) = state.peer else {
                    warn!("candidate ready but no console address seen yet");
                    state.current = None;
                    return;
                };
                self.call_station(&selected, peer).await;
                state.current = Some(selected.row.call.clone());
                state.retries = 0;
            }
            Ok(None) => state.current = None,
            Err(err) => error!("selection failed: {err}"),
        }
    }

    async fn call_station(&mut self, selected: &Selected, peer: SocketAddr) {
        let row = &selected.row;
        info!(
            "calling: {} ({}), from: {}, snr: {}, distance: {:.0}, band: {}m - {} - https://www.qrz.com/db/{}",
            row.call,
            row.extra.as_deref().unwrap_or("-"),
            row.country,
            row.snr,
            row.distance,
            row.band,
            selected.selector,
            row.call
        );
        let packet = reply_from(&row.packet, self.follow_frequency);
        debug!("transmitting {packet:?}");
        self.send(packet.into(), peer).await;
    }

    /// Serialize and send; network failures are logged, never fatal.
    async fn send(&self, packet: Packet, addr: SocketAddr) {
        let mut buf = [0u8; MAX_DATAGRAM];
        match packet.serialize(&mut buf) {
            Ok(n) => {
                if let Err(err) = self.socket.send_to(&buf[..n as usize], addr).await {
                    error!("udp send to {addr}: {err}");
                }
            }
            Err(err) => error!("packet serialization: {err}"),
        }
    }

    fn enqueue(&self, command: Command) {
        if self.queue.send(command).is_err() {
            error!("database writer is gone, dropping command");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use crate::config::Controller;
    use crate::packet::decode;
    use crate::selector::test_support::{sighting, test_store};
    use crate::selector::{Any, Tuning};

    fn controller() -> Controller {
        Controller {
            db_name: "/tmp/unused.db".into(),
            my_call: "K1ABC".to_string(),
            my_grid: "CM87".to_string(),
            wsjt_ip: "127.0.0.1".to_string(),
            wsjt_port: 0,
            logger_ip: None,
            logger_port: None,
            follow_frequency: false,
            tx_power: None,
            tx_retries: 5,
            retry_time: 15,
            call_selector: vec!["Any".to_string()],
            logfile_name: "ft8ctrl.log".into(),
            logfile_size: 8 << 16,
            dxcc_path: None,
            lotw_path: None,
        }
    }

    fn empty_pipeline() -> Pipeline {
        Pipeline::for_tests(
            vec![Box::new(Any::new(Tuning::default()))],
            test_store(&[]),
            BTreeSet::new(),
            "NA",
        )
    }

    async fn sequencer(pipeline: Pipeline) -> (Sequencer, UnboundedReceiver<Command>) {
        let (queue, commands) = mpsc::unbounded_channel();
        let sequencer = Sequencer::new(&controller(), queue, pipeline)
            .await
            .unwrap();
        (sequencer, commands)
    }

    async fn recv_packet(console: &tokio::net::UdpSocket) -> Packet {
        let mut buf = [0u8; 512];
        let (n, _) = tokio::time::timeout(Duration::from_secs(1), console.recv_from(&mut buf))
            .await
            .expect("no packet within a second")
            .unwrap();
        Packet::parse(&buf[..n]).unwrap()
    }

    #[tokio::test]
    async fn snipe_abort_halts_and_deletes() {
        let (mut sequencer, mut commands) = sequencer(empty_pipeline()).await;
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let src = console.local_addr().unwrap();

        let mut state = State {
            current: Some("W1AW".to_string()),
            frequency: 14_074_000,
            ..State::default()
        };
        let packet = decode::Packet::default();
        sequencer
            .handle_message(&mut state, "W9XYZ W1AW -12", &packet, src)
            .await;

        assert!(matches!(recv_packet(&console).await, Packet::HaltTx(_)));
        match commands.try_recv().unwrap() {
            Command::Delete { call, band } => {
                assert_eq!(call, "W1AW");
                assert_eq!(band, 20);
            }
            other => panic!("expected a delete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_to_us_does_not_abort() {
        let (mut sequencer, mut commands) = sequencer(empty_pipeline()).await;
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let src = console.local_addr().unwrap();

        let mut state = State {
            current: Some("W1AW".to_string()),
            frequency: 14_074_000,
            ..State::default()
        };
        let packet = decode::Packet::default();
        sequencer
            .handle_message(&mut state, "K1ABC W1AW -12", &packet, src)
            .await;
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn cq_is_enqueued_for_insertion() {
        let (mut sequencer, mut commands) = sequencer(empty_pipeline()).await;
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let src = console.local_addr().unwrap();

        let mut state = State {
            frequency: 14_074_000,
            ..State::default()
        };
        let packet = decode::Packet {
            snr: -5,
            message: Some("CQ W1AW FN31".to_string()),
            ..decode::Packet::default()
        };
        sequencer
            .handle_message(&mut state, "CQ W1AW FN31", &packet, src)
            .await;

        match commands.try_recv().unwrap() {
            Command::Insert(cq) => {
                assert_eq!(cq.call, "W1AW");
                assert_eq!(cq.grid.as_deref(), Some("FN31"));
                assert_eq!(cq.band, 20);
                assert_eq!(cq.packet.snr, -5);
            }
            other => panic!("expected an insert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_updates_gate_slots_and_marks_replying() {
        let (mut sequencer, mut commands) = sequencer(empty_pipeline()).await;
        let mut state = State::default();

        let packet = status::Packet {
            frequency: 14_074_000,
            tx_mode: Some("FT8".to_string()),
            transmitting: true,
            decoding: true,
            dx_call: Some("W1AW".to_string()),
            ..status::Packet::default()
        };
        sequencer.handle_status(&mut state, &packet).await;

        assert!(state.tx_status);
        assert_eq!(state.frequency, 14_074_000);
        assert_eq!(state.sequence, slot_table(Mode::Ft8));
        match commands.try_recv().unwrap() {
            Command::Status { call, status, band } => {
                assert_eq!(call, "W1AW");
                assert_eq!(status, Status::Replying);
                assert_eq!(band, 20);
            }
            other => panic!("expected a status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_unanswered_calls_halt_tx() {
        let (mut sequencer, _commands) = sequencer(empty_pipeline()).await;
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut state = State {
            peer: Some(console.local_addr().unwrap()),
            ..State::default()
        };
        let packet = status::Packet {
            frequency: 14_074_000,
            transmitting: true,
            decoding: false,
            dx_call: Some("W1AW".to_string()),
            tx_message: Some("W1AW K1ABC -07".to_string()),
            ..status::Packet::default()
        };
        // first report arms the shadow, five more exhaust the retries
        for _ in 0..6 {
            sequencer.handle_status(&mut state, &packet).await;
        }

        assert!(matches!(recv_packet(&console).await, Packet::HaltTx(_)));
        assert_eq!(state.retries, 0);
    }

    #[tokio::test]
    async fn slot_selection_replies_and_sets_current() {
        let store = test_store(&[sighting("W1AW", 20, -5)]);
        let pipeline = Pipeline::for_tests(
            vec![Box::new(Any::new(Tuning::default()))],
            store,
            BTreeSet::new(),
            "NA",
        );
        let (mut sequencer, _commands) = sequencer(pipeline).await;
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut state = State {
            peer: Some(console.local_addr().unwrap()),
            frequency: 14_074_000,
            ..State::default()
        };
        sequencer.try_slot(&mut state).await;

        assert_eq!(state.current.as_deref(), Some("W1AW"));
        match recv_packet(&console).await {
            Packet::Reply(reply) => {
                assert_eq!(reply.message.as_deref(), Some("CQ W1AW FN31"));
                assert_eq!(reply.snr, -5);
            }
            other => panic!("expected a reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_selection_clears_current() {
        let (mut sequencer, _commands) = sequencer(empty_pipeline()).await;
        let console = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut state = State {
            peer: Some(console.local_addr().unwrap()),
            frequency: 14_074_000,
            current: Some("W1AW".to_string()),
            ..State::default()
        };
        sequencer.try_slot(&mut state).await;
        assert_eq!(state.current, None);
    }

    #[test]
    fn quit_command_exits() {
        // handle_command is synchronous; exercise the parsing table
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let (mut sequencer, _commands) = sequencer(empty_pipeline()).await;
            let mut state = State::default();
            assert!(matches!(
                sequencer.handle_command(&mut state, "quit"),
                Control::Quit
            ));
            assert!(matches!(
                sequencer.handle_command(&mut state, "PAUSE"),
                Control::Continue
            ));
            assert!(state.pause);
            sequencer.handle_command(&mut state, "RUN");
            assert!(!state.pause);
            sequencer.handle_command(&mut state, "bogus");
        });
    }

    #[test]
    fn slot_tables_per_mode() {
        assert_eq!(slot_table(Mode::Ft8), &[2, 17, 32, 47]);
        assert_eq!(slot_table(Mode::Ft4).len(), 10);
        assert!(slot_table(Mode::Ft4).contains(&0));
        assert!(slot_table(Mode::Ft4).contains(&54));
        assert!(!slot_table(Mode::Ft4).contains(&55));
    }

    #[test]
    fn reply_echoes_the_envelope() {
        let when = Utc.with_ymd_and_hms(2024, 6, 1, 12, 34, 56).unwrap();
        let envelope = Envelope {
            time: when,
            new: true,
            snr: -7,
            delta_time: 0.5,
            delta_frequency: 1500,
            mode: Some("~".to_string()),
            message: Some("CQ W1AW FN31".to_string()),
            low_confidence: false,
            off_air: false,
        };

        let packet = reply_from(&envelope, false);
        assert_eq!(packet.time, ((12 * 3600 + 34 * 60 + 56) * 1000) as u32);
        assert_eq!(packet.snr, -7);
        assert_eq!(packet.delta_frequency, 1500);
        assert_eq!(packet.message.as_deref(), Some("CQ W1AW FN31"));
        assert_eq!(packet.modifiers, modifiers::NONE);
        assert_eq!(packet.id.as_deref(), Some(crate::packet::REPLY_CLIENT_ID));
    }

    #[test]
    fn follow_frequency_sets_the_shift_modifier() {
        let envelope = Envelope {
            time: Utc::now(),
            new: true,
            snr: -7,
            delta_time: 0.5,
            delta_frequency: 1500,
            mode: Some("~".to_string()),
            message: Some("CQ W1AW FN31".to_string()),
            low_confidence: false,
            off_air: false,
        };
        assert_eq!(reply_from(&envelope, true).modifiers, modifiers::SHIFT);
    }
}

use crate::game::ClientGameState;
use crate::input::{parse_line, Command, HELP};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::interval;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const MAX_PACKET_SIZE: usize = 8192;

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    resume: Option<PlayerId>,
    connected: bool,
    game_state: ClientGameState,
}

impl Client {
    pub async fn new(server_addr: &str, name: &str, resume: Option<PlayerId>) -> ClientResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            name: name.to_string(),
            resume,
            connected: false,
            game_state: ClientGameState::new(),
        })
    }

    async fn connect(&mut self) -> ClientResult<()> {
        info!("Connecting to server at {}...", self.server_addr);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
            resume: self.resume,
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> ClientResult<()> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match &packet {
            Packet::Connected { player_id } => {
                self.connected = true;
                self.resume = Some(*player_id);
            }
            Packet::Disconnected { reason } => {
                warn!("Server dropped us: {}", reason);
            }
            _ => {}
        }

        for line in self.game_state.apply(packet) {
            println!("{line}");
        }
    }

    /// Returns false when the player asked to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let command = match parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(e) => {
                println!("! {e}");
                return true;
            }
        };

        match command {
            Command::Help => {
                println!("{HELP}");
                for line in self.game_state.leaderboard_lines() {
                    println!("{line}");
                }
            }
            Command::Quit => return false,
            Command::Draw(_) if !self.game_state.is_drawing() => {
                println!("! It is not your turn to draw");
            }
            command => {
                if !self.connected {
                    println!("! Not connected yet");
                    return true;
                }
                if let Some(packet) = command.to_packet() {
                    if let Err(e) = self.send_packet(&packet).await {
                        error!("Error sending packet: {}", e);
                    }
                }
            }
        }
        true
    }

    pub async fn run(&mut self) -> ClientResult<()> {
        self.connect().await?;

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) if addr == self.server_addr => {
                            match deserialize::<Packet>(&buffer[..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(e) => warn!("Undecodable packet from server: {}", e),
                            }
                        }
                        Ok((_, addr)) => debug!("Ignoring datagram from {}", addr),
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = stdin.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line).await {
                                break;
                            }
                        }
                        None => break,
                    }
                },

                _ = heartbeat.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

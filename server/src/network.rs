//! Server network layer: UDP transport, client identity and dispatch into
//! the gateway

use crate::client_manager::{ClientManager, Removed};
use crate::config::ServerConfig;
use crate::directory::InMemoryRoomDirectory;
use crate::engine::GameEngine;
use crate::gateway::{GameMessage, Gateway};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

pub const MAX_PACKET_SIZE: usize = 8192;

pub type NetResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout(Removed),
    Shutdown,
}

/// UDP front end for the game
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    gateway: Arc<Gateway>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        config: &ServerConfig,
        engine: Arc<GameEngine>,
        rooms: Arc<InMemoryRoomDirectory>,
    ) -> NetResult<Self> {
        let socket = Arc::new(UdpSocket::bind(config.bind_address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(Gateway::new(engine, rooms, game_tx, config.room_limits()));

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.client_timeout(),
            ))),
            gateway,
            server_tx,
            server_rx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    /// Sender for stopping `run` from outside, e.g. on Ctrl+C
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                debug!("Main loop gone, stopping receiver");
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that resolves gateway messages to addresses and sends them
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            warn!("Network sender already running");
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { player_id, packet } => {
                        let addr = clients.read().await.addr_of(player_id);
                        match addr {
                            Some(addr) => {
                                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                    error!("Failed to send to player {}: {}", player_id, e);
                                }
                            }
                            None => debug!("Dropping packet for offline player {}", player_id),
                        }
                    }
                    GameMessage::BroadcastPacket {
                        room_id,
                        packet,
                        exclude,
                    } => {
                        let targets = clients.read().await.room_addrs(&room_id, exclude);
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to encode broadcast for room {}: {}", room_id, e);
                                continue;
                            }
                        };
                        for (player_id, addr) in targets {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to player {}: {}", player_id, e);
                            }
                        }
                    }
                    GameMessage::CloseRoom { room_id } => {
                        clients.write().await.clear_room(&room_id);
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts();
                for removed in timed_out {
                    if server_tx.send(ServerMessage::ClientTimeout(removed)).is_err() {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> NetResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Sends straight to an address, for clients that have no player id
    async fn send_to_addr(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = Self::send_packet_impl(&self.socket, packet, addr).await {
            error!("Failed to send packet to {}: {}", addr, e);
        }
    }

    async fn handle_connect(
        &mut self,
        client_version: u32,
        name: String,
        resume: Option<PlayerId>,
        addr: SocketAddr,
    ) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );
        if client_version != PROTOCOL_VERSION {
            let reason = format!(
                "Protocol version {client_version} is not supported (server speaks {PROTOCOL_VERSION})"
            );
            self.send_to_addr(&Packet::Disconnected { reason }, addr).await;
            return;
        }

        let existing = self.clients.read().await.find_client_by_addr(addr);
        if let Some(existing_id) = existing {
            info!("Replacing existing player {} from {}", existing_id, addr);
            self.drop_client(existing_id).await;
        }

        let mut clients = self.clients.write().await;
        if let Some(player_id) = resume {
            if let Some(room) = clients.resume_client(player_id, addr) {
                let name = clients
                    .get(player_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                drop(clients);

                self.send_to_addr(&Packet::Connected { player_id }, addr).await;
                if let Some(room) = room {
                    self.spawn_join(player_id, name, room);
                }
                return;
            }
            debug!("Cannot resume player {}; assigning a new id", player_id);
        }

        match clients.add_client(addr, &name) {
            Some(player_id) => {
                drop(clients);
                self.send_to_addr(&Packet::Connected { player_id }, addr).await;
            }
            None => {
                drop(clients);
                let reason = "Server full".to_string();
                self.send_to_addr(&Packet::Disconnected { reason }, addr).await;
            }
        }
    }

    /// Joins a room in the background and records membership on success.
    fn spawn_join(&self, player_id: PlayerId, name: String, code: String) {
        let gateway = Arc::clone(&self.gateway);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            let room = gateway.join_room(player_id, &name, &code).await;
            clients.write().await.set_room(player_id, room);
        });
    }

    /// Forgets a client and tells the gateway it left its room.
    async fn drop_client(&self, player_id: PlayerId) {
        let removed = self.clients.write().await.remove_client(player_id);
        if let Some(removed) = removed {
            self.notify_left(removed);
        }
    }

    fn notify_left(&self, removed: Removed) {
        let Some(room) = removed.room else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            gateway.player_left(&room, removed.player_id).await;
        });
    }

    fn reject(&self, player_id: PlayerId, reason: &str) {
        let packet = Packet::Rejected {
            reason: reason.to_string(),
        };
        let clients = Arc::clone(&self.clients);
        let socket = Arc::clone(&self.socket);
        tokio::spawn(async move {
            let addr = clients.read().await.addr_of(player_id);
            if let Some(addr) = addr {
                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send rejection to player {}: {}", player_id, e);
                }
            }
        });
    }

    /// Processes one decoded packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            name,
            resume,
        } = packet
        {
            self.handle_connect(client_version, name, resume, addr).await;
            return;
        }

        let (player_id, name, room) = {
            let mut clients = self.clients.write().await;
            let Some(player_id) = clients.find_client_by_addr(addr) else {
                debug!("Ignoring packet from unknown address {}", addr);
                return;
            };
            clients.touch(player_id);
            let Some(client) = clients.get(player_id) else {
                return;
            };
            (player_id, client.name.clone(), client.room.clone())
        };

        match packet {
            Packet::CreateRoom {
                rounds,
                category,
                drawing_secs,
            } => {
                if room.is_some() {
                    self.reject(player_id, "Leave your current room first");
                    return;
                }
                let code = self
                    .gateway
                    .create_room(player_id, &name, rounds, &category, drawing_secs)
                    .await;
                self.clients.write().await.set_room(player_id, Some(code));
            }

            Packet::JoinRoom { code } => {
                if room.is_some() {
                    self.reject(player_id, "Leave your current room first");
                    return;
                }
                self.spawn_join(player_id, name, code);
            }

            Packet::StartGame => {
                let Some(room) = room else {
                    self.reject(player_id, "You are not in a room");
                    return;
                };
                let present = self.clients.read().await.players_in_room(&room);
                let gateway = Arc::clone(&self.gateway);
                tokio::spawn(async move {
                    gateway.start_game(player_id, &room, present).await;
                });
            }

            Packet::Guess { text } => {
                let Some(room) = room else {
                    self.reject(player_id, "You are not in a room");
                    return;
                };
                let gateway = Arc::clone(&self.gateway);
                tokio::spawn(async move {
                    gateway.guess(&room, player_id, &text).await;
                });
            }

            Packet::Draw { stroke } => {
                let Some(room) = room else {
                    return;
                };
                let gateway = Arc::clone(&self.gateway);
                tokio::spawn(async move {
                    gateway.draw(&room, player_id, stroke).await;
                });
            }

            Packet::Heartbeat => {}

            Packet::Disconnect => {
                self.drop_client(player_id).await;
            }

            _ => {
                warn!("Unexpected packet type from player {} at {}", player_id, addr);
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> NetResult<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout(removed) => {
                    info!("Player {} timed out", removed.player_id);
                    self.notify_left(removed);
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!("Server shutting down");
        Ok(())
    }
}

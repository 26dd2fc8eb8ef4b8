mod board;

use std::net::SocketAddr;

use omok::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use board::{Board, Placement, Stone};

const RULES: &str = "\
Omok is played by two players on a 15x15 grid.
One player is black (X), the other white (O); black moves first.
Players take turns placing one stone on an empty intersection.
The first player to line up five stones horizontally, vertically or
diagonally wins.";

const HELP: &str = "\
commands:
  connect <host> <port>   dial another player
  play                    ask the connected player for a game
  move <col> <row>        place a stone (0-14)
  board                   show the board
  quit                    leave the current game
  about                   show the rules
  exit                    leave the program";

// ---------------------------------------------------------------------------
// Controller: forwards session events to the main loop
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum UiEvent {
    Connected(Role, SocketAddr),
    GameStarted { self_first: bool },
    Declined,
    OpponentMoved(i32, i32),
    Acknowledged(i32, i32),
    OpponentLeft,
    LeftGame,
    ConnectionLost,
    Garbled,
}

struct Ui {
    events: mpsc::UnboundedSender<UiEvent>,
    auto_accept: bool,
}

impl Ui {
    fn emit(&self, event: UiEvent) {
        let _ = self.events.send(event);
    }
}

impl Controller for Ui {
    fn on_connected(&self, role: Role, peer: SocketAddr) {
        self.emit(UiEvent::Connected(role, peer));
    }

    fn on_pairing_offer(&self) -> bool {
        // Runs on the receive loop, so it can't wait for a keypress.
        if self.auto_accept {
            self.emit(UiEvent::GameStarted { self_first: false });
        } else {
            println!("game offer declined (OMOK_AUTO_ACCEPT is off)");
        }
        self.auto_accept
    }

    fn on_pairing_result(&self, accepted: bool, self_plays_first: bool) {
        if accepted {
            self.emit(UiEvent::GameStarted {
                self_first: self_plays_first,
            });
        } else {
            self.emit(UiEvent::Declined);
        }
    }

    fn on_move_received(&self, col: i32, row: i32) {
        self.emit(UiEvent::OpponentMoved(col, row));
    }

    fn on_move_acknowledged(&self, col: i32, row: i32) {
        self.emit(UiEvent::Acknowledged(col, row));
    }

    fn on_opponent_left(&self) {
        self.emit(UiEvent::OpponentLeft);
    }

    fn on_left_game(&self) {
        self.emit(UiEvent::LeftGame);
    }

    fn on_connection_terminated(&self) {
        self.emit(UiEvent::ConnectionLost);
    }

    fn on_unknown_message(&self) {
        self.emit(UiEvent::Garbled);
    }
}

// ---------------------------------------------------------------------------
// Game: the board and whose stone is whose
// ---------------------------------------------------------------------------

struct Game {
    session: Session<Ui>,
    board: Board,
    mine: Stone,
}

impl Game {
    fn start(&mut self, self_first: bool) {
        self.board.clear();
        self.mine = if self_first { Stone::Black } else { Stone::White };
        println!("game on! you play {}", self.mine);
        println!("{}", if self_first { "your turn" } else { "opponent's turn" });
    }

    fn reset(&mut self, note: &str) {
        self.board.clear();
        println!("{note}");
    }

    fn local_move(&mut self, col: i32, row: i32) -> Result<(), Box<dyn std::error::Error>> {
        if self.session.turn() != Some(Side::Local) {
            return Err("not your turn".into());
        }
        self.board.check(col, row)?;
        self.session.send_move(col, row)?;
        let placement = self.board.place(col, row, self.mine)?;
        self.after_placement(placement, Side::Local)
    }

    fn opponent_move(&mut self, col: i32, row: i32) {
        match self.board.place(col, row, self.mine.other()) {
            Ok(placement) => {
                if let Err(e) = self.after_placement(placement, Side::Peer) {
                    tracing::warn!(error = %e, "couldn't update turn");
                }
            }
            Err(e) => println!("opponent sent an illegal move: {e}"),
        }
    }

    fn after_placement(
        &mut self,
        placement: Placement,
        mover: Side,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", self.board);
        match placement {
            Placement::Won(line) => {
                self.session.finish_game()?;
                let verdict = if mover == Side::Local { "You won!" } else { "You lost." };
                println!("{verdict} winning line: {line:?}");
                println!("type `play` for a rematch");
            }
            Placement::Continue if self.board.is_full() => {
                self.session.finish_game()?;
                println!("board full, it's a draw");
            }
            Placement::Continue => {
                self.session.set_turn(mover.opponent())?;
                let next = if mover == Side::Local { "opponent's turn" } else { "your turn" };
                println!("{next}");
            }
        }
        Ok(())
    }

    fn on_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Connected(role, peer) => {
                println!("connected to {peer} as {role}; type `play` to pair");
            }
            UiEvent::GameStarted { self_first } => self.start(self_first),
            UiEvent::Declined => println!("the other player declined"),
            UiEvent::OpponentMoved(col, row) => {
                println!("opponent played ({col}, {row})");
                self.opponent_move(col, row);
            }
            UiEvent::Acknowledged(col, row) => {
                tracing::debug!(col, row, "move acknowledged");
            }
            UiEvent::OpponentLeft => self.reset("opponent left the game, pair for a new one"),
            UiEvent::LeftGame => self.reset("you left the game, pair for a new one"),
            UiEvent::ConnectionLost => self.reset("connection lost"),
            UiEvent::Garbled => println!("received an unrecognised message"),
        }
    }

    /// Runs one command line. Returns `false` on `exit`.
    async fn on_command(&mut self, line: &str) -> bool {
        let words: Vec<&str> = line.split_whitespace().collect();
        let result: Result<(), Box<dyn std::error::Error>> = match words.as_slice() {
            [] => Ok(()),
            ["connect", host, port] => {
                let addr = format!("{host}:{port}");
                self.session.connect(&addr).await.map(|_| ()).map_err(Into::into)
            }
            ["play"] => self.session.play().map_err(Into::into).map(|()| {
                println!("play request sent");
            }),
            ["move", col, row] => match (col.parse(), row.parse()) {
                (Ok(col), Ok(row)) => self.local_move(col, row),
                _ => Err("usage: move <col> <row>".into()),
            },
            ["board"] => {
                println!("{}", self.board);
                Ok(())
            }
            ["quit"] => self.session.quit().map_err(Into::into),
            ["about"] => {
                println!("{RULES}");
                Ok(())
            }
            ["exit"] => return false,
            _ => {
                println!("{HELP}");
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("error: {e}");
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.trim(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    omok::init_tracing();

    let port = match std::env::var("OMOK_PORT") {
        Ok(value) => value.parse()?,
        Err(_) => DEFAULT_PORT,
    };
    let (events, mut event_rx) = mpsc::unbounded_channel();
    let ui = Ui {
        events,
        auto_accept: env_flag("OMOK_AUTO_ACCEPT", true),
    };

    let session = OmokPeerBuilder::new()
        .port(port)
        .listen(true)
        .build(ui)
        .await?;
    if let Some(addr) = session.local_addr() {
        println!("waiting for a player on {addr}");
    }
    println!("{HELP}");

    let mut game = Game {
        session,
        board: Board::new(),
        mine: Stone::Black,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !game.on_command(&line).await {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = event_rx.recv() => game.on_event(event),
        }
    }

    game.session.shutdown().await;
    println!("bye");
    Ok(())
}

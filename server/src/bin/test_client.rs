use clap::Parser;
use server::network::RpcClient;
use shared::{Direction, Request, Response, ResponseBody};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Plays one scripted round against a running server")]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Number of moves each player makes
    #[clap(short, long, default_value = "12")]
    moves: usize,
    /// Delay between moves in milliseconds
    #[clap(short, long, default_value = "200")]
    delay_ms: u64,
}

const DEADLINE: Duration = Duration::from_secs(2);

async fn call(client: &RpcClient, request: Request) -> Result<Response, Box<dyn std::error::Error>> {
    let name = request.name();
    let response = client.call(request, DEADLINE).await?;
    if response.success {
        println!("{}: {}", name, response.message);
    } else {
        println!("{} failed ({:?}): {}", name, response.kind, response.message);
    }
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let client = RpcClient::connect(args.server).await?;
    println!("Talking to server at {}", args.server);

    let created = call(
        &client,
        Request::CreateRoom {
            user_id: "alice".to_string(),
            room_name: "test room".to_string(),
            max_players: 2,
        },
    )
    .await?;
    let room_id = match created.body {
        ResponseBody::RoomCreated { room_id } => room_id,
        _ => return Err("server did not return a room id".into()),
    };
    println!("Room id: {}", room_id);

    call(
        &client,
        Request::JoinRoom {
            room_id: room_id.clone(),
            user_id: "bob".to_string(),
        },
    )
    .await?;
    call(
        &client,
        Request::SendMessage {
            room_id: room_id.clone(),
            sender_id: "bob".to_string(),
            content: "ready when you are".to_string(),
            message_type: "text".to_string(),
        },
    )
    .await?;
    call(&client, Request::StartGame { room_id: room_id.clone() }).await?;

    for player in ["alice", "bob"] {
        call(
            &client,
            Request::JoinGame {
                room_id: room_id.clone(),
                player_id: player.to_string(),
            },
        )
        .await?;
    }

    // Alice circles, Bob runs for the right wall
    let circle = [Direction::Up, Direction::Left, Direction::Down, Direction::Right];
    for i in 0..args.moves {
        for (player, direction) in [("alice", circle[i % circle.len()]), ("bob", Direction::Right)] {
            call(
                &client,
                Request::Move {
                    room_id: room_id.clone(),
                    player_id: player.to_string(),
                    direction,
                },
            )
            .await?;
        }

        let state = call(&client, Request::GetGameState { room_id: room_id.clone() }).await?;
        if let ResponseBody::GameState(snapshot) = state.body {
            println!("  version {} status {:?}", snapshot.version, snapshot.status);
            for snake in &snapshot.snakes {
                println!(
                    "  {}: head={} length={} score={} alive={}",
                    snake.player_id,
                    snake.head(),
                    snake.length,
                    snake.score,
                    snake.alive
                );
            }
        }

        sleep(Duration::from_millis(args.delay_ms)).await;
    }

    let messages = call(
        &client,
        Request::GetRoomMessages {
            room_id: room_id.clone(),
            limit: 20,
            since: 0,
        },
    )
    .await?;
    if let ResponseBody::Messages(messages) = messages.body {
        for message in messages {
            println!("  [{}] {}: {}", message.id, message.sender_name, message.content);
        }
    }

    for player in ["alice", "bob"] {
        call(
            &client,
            Request::LeaveRoom {
                room_id: room_id.clone(),
                user_id: player.to_string(),
            },
        )
        .await?;
    }

    println!("Test client finished");
    Ok(())
}

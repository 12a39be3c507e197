#![allow(unused)]
use anyhow::Result;
use api::*;
use clap::{Parser, Subcommand};

use crate::client::Client;

mod api;
mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    NewWheel {
        #[arg(short, long)]
        name: String,
    },
    GetWheels,
    GetWheel {
        #[arg(short, long)]
        wheel: RowId,
    },
    AddPrize {
        #[arg(long)]
        wheel: RowId,
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        weight: f64,
        #[arg(short, long)]
        color: String,
        #[arg(short, long)]
        label: Option<String>,
    },
    UpdatePrize {
        #[arg(short, long)]
        prize: RowId,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(short, long)]
        color: Option<String>,
        #[arg(short, long)]
        label: Option<String>,
    },
    RemovePrize {
        #[arg(short, long)]
        prize: RowId,
    },
    Spin {
        #[arg(short, long)]
        wheel: RowId,
        #[arg(short, long)]
        customer: String,
        #[arg(short, long)]
        rating: i64,
        #[arg(long)]
        comment: Option<String>,
    },
    GetSpin {
        #[arg(short, long)]
        code: RedemptionCode,
    },
    Redeem {
        #[arg(short, long)]
        code: RedemptionCode,
    },
    GetStats {
        #[arg(short, long)]
        wheel: RowId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::NewWheel { name } => {
            let rowid = client.new_wheel(name).await?;
            println!("Created new wheel: {}", rowid);
        }
        Commands::GetWheels => {
            let response = client.get_wheels().await?;
            println!("{:#?}", response);
        }
        Commands::GetWheel { wheel } => {
            let response = client.get_wheel(wheel).await?;
            println!("{:#?}", response);
        }
        Commands::AddPrize {
            wheel,
            name,
            weight,
            color,
            label,
        } => {
            let request = AddPrizeRequest {
                wheel,
                name,
                weight,
                color,
                probability_label: label,
            };
            let rowid = client.add_prize(request).await?;
            println!("Added prize: {}", rowid);
        }
        Commands::UpdatePrize {
            prize,
            name,
            weight,
            color,
            label,
        } => {
            let request = UpdatePrizeRequest {
                prize,
                name,
                weight,
                color,
                probability_label: label,
            };
            client.update_prize(request).await?;
        }
        Commands::RemovePrize { prize } => {
            client.remove_prize(prize).await?;
        }
        Commands::Spin {
            wheel,
            customer,
            rating,
            comment,
        } => {
            let request = SpinRequest {
                wheel,
                customer,
                rating,
                comment,
            };
            let response = client.spin(request).await?;
            println!("{:#?}", response);
            println!(
                "Won {}, redeem with code {}",
                response.prize.name, response.code
            );
        }
        Commands::GetSpin { code } => {
            let response = client.get_spin(code).await?;
            println!("{:#?}", response);
        }
        Commands::Redeem { code } => {
            client.redeem(code.clone()).await?;
            println!("Redeemed {}", code);
        }
        Commands::GetStats { wheel } => {
            let response = client.get_stats(wheel).await?;
            println!("{:#?}", response);
        }
    }
    Ok(())
}

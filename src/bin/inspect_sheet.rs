use clap::Parser;
use std::path::PathBuf;

use bcv_stats::config::DecoderOrder;
use bcv_stats::importers::{CellValue, SpreadsheetDecoder};

#[derive(Parser)]
#[command(name = "inspect-sheet")]
#[command(about = "Decode a local BCV spreadsheet and print what the pipeline would see", long_about = None)]
struct Cli {
    /// Spreadsheet file (.xls or .xlsx, extension is not trusted)
    file: PathBuf,

    /// Try the .xlsx reader before the .xls one
    #[arg(long)]
    modern_first: bool,

    /// Row holding the column labels
    #[arg(long, default_value = "0")]
    header_row: usize,

    /// Data rows to print
    #[arg(long, default_value = "20")]
    rows: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let order = if cli.modern_first {
        DecoderOrder::ModernFirst
    } else {
        DecoderOrder::LegacyFirst
    };

    println!("Opening spreadsheet: {}", cli.file.display());
    let bytes = std::fs::read(&cli.file)?;
    println!("Size: {} bytes", bytes.len());

    let table = SpreadsheetDecoder::new(order, cli.header_row).decode(&bytes)?;

    println!(
        "\nDimensions: {} rows x {} columns",
        table.row_count(),
        table.column_count()
    );
    println!("\nColumns:");
    for (i, label) in table.columns().iter().enumerate() {
        println!("  {i:3}: {}", render(label));
    }

    println!("\n{}", "=".repeat(100));
    println!("First {} rows:", cli.rows.min(table.row_count()));
    println!("{}", "=".repeat(100));
    for (row_idx, row) in table.rows().iter().enumerate().take(cli.rows) {
        print!("Row {:3}: ", row_idx + 1);
        for cell in row {
            print!("[{}] ", render(cell));
        }
        println!();
    }

    Ok(())
}

fn render(cell: &CellValue) -> String {
    match cell {
        CellValue::Text(s) => s.clone(),
        CellValue::Integer(i) => i.to_string(),
        CellValue::Number(f) => f.to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Missing => "empty".to_string(),
    }
}

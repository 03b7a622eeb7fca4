use clap::ValueEnum;
use color_eyre::Result;
use taxondb_core::{CladeInfo, Classification, Levels, Lineage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Tsv,
    Json,
}

/// Which classification table to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableChoice {
    Ids,
    Names,
    Both,
}

pub fn print_lineage(lineage: &Lineage, levels: &Levels, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(lineage)?),
        Format::Tsv => {
            for level in levels.iter() {
                match lineage.id_at(level) {
                    Some(id) => println!(
                        "{}\t{}\t{}",
                        level,
                        id,
                        lineage.name_of(id).unwrap_or("")
                    ),
                    None => println!("{}\t\t", level),
                }
            }
        }
    }
    Ok(())
}

pub fn print_classification(
    result: &Classification,
    format: Format,
    table: TableChoice,
) -> Result<()> {
    match (format, table) {
        (Format::Json, TableChoice::Ids) => println!("{}", serde_json::to_string_pretty(&result.ids)?),
        (Format::Json, TableChoice::Names) => {
            println!("{}", serde_json::to_string_pretty(&result.names)?)
        }
        (Format::Json, TableChoice::Both) => println!("{}", serde_json::to_string_pretty(result)?),
        (Format::Tsv, TableChoice::Ids) => print!("{}", result.ids.to_tsv()),
        (Format::Tsv, TableChoice::Names) => print!("{}", result.names.to_tsv()),
        (Format::Tsv, TableChoice::Both) => {
            print!("{}", result.ids.to_tsv());
            println!();
            print!("{}", result.names.to_tsv());
        }
    }
    Ok(())
}

pub fn print_clade_info(info: &CladeInfo, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(info)?),
        Format::Tsv => {
            for clade in &info.clades {
                println!(
                    "{}\t{}\t{}",
                    clade.level,
                    clade.tax_id,
                    clade.name.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

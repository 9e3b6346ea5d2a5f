use clap::Parser;
use serde::Serialize;
use sheet_matcher::{
    DemandPiece, MaterialEstimate, OptimizationResult, Optimizer, PolicyMode, SufficiencyReport,
    SupplySheet, check_sufficiency, estimate_material_needed,
};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "sheet_matcher",
    about = "Match furniture parts to stock sheets by thickness with minimal waste"
)]
struct Cli {
    /// Stock sheets as WxH@thickness[:id] (e.g. 2440x1220@18:birch 2440x1220@6)
    #[arg(long = "sheets", num_args = 1.., required = true)]
    sheets: Vec<String>,

    /// Parts as [name=]WxH:qty@thickness[/category] (e.g. side=800x500:2@18/side)
    #[arg(long = "pieces", num_args = 1..)]
    pieces: Vec<String>,

    /// Optimization mode
    #[arg(long, default_value = "minimize-waste", value_parser = parse_mode)]
    mode: PolicyMode,

    /// Blade kerf width in mm (default: 0)
    #[arg(long, default_value_t = 0)]
    kerf: u32,

    /// Disable piece rotation
    #[arg(long)]
    no_rotate: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Log matcher progress to stderr
    #[arg(long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    mode: PolicyMode,
    result: &'a OptimizationResult,
    sufficiency: SufficiencyReport,
    estimate: MaterialEstimate,
}

fn parse_mode(s: &str) -> Result<PolicyMode, String> {
    s.parse()
}

fn parse_number(s: &str, what: &str, input: &str) -> Result<u32, String> {
    s.parse::<u32>()
        .map_err(|_| format!("invalid {} in '{}'", what, input))
}

fn parse_dimensions(s: &str, input: &str) -> Result<(u32, u32), String> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != 2 {
        return Err(format!("invalid dimensions in '{}', expected WxH", input));
    }
    let width = parse_number(parts[0], "width", input)?;
    let height = parse_number(parts[1], "height", input)?;
    if width == 0 || height == 0 {
        return Err(format!("dimensions must be non-zero in '{}'", input));
    }
    Ok((width, height))
}

fn parse_thickness(s: &str, input: &str) -> Result<u32, String> {
    let thickness = parse_number(s, "thickness", input)?;
    if thickness == 0 {
        return Err(format!("thickness must be non-zero in '{}'", input));
    }
    Ok(thickness)
}

fn parse_sheet(s: &str, index: usize) -> Result<SupplySheet, String> {
    let (body, id) = match s.split_once(':') {
        Some((body, id)) if !id.is_empty() => (body, id.to_string()),
        Some(_) => return Err(format!("empty sheet id in '{}'", s)),
        None => (s, format!("s{}", index + 1)),
    };
    let (dims, thickness) = body
        .split_once('@')
        .ok_or_else(|| format!("invalid sheet '{}', expected WxH@thickness[:id]", s))?;
    let (width, height) = parse_dimensions(dims, s)?;
    let thickness = parse_thickness(thickness, s)?;
    Ok(SupplySheet::new(id, width, height, thickness))
}

fn parse_piece(s: &str, index: usize) -> Result<DemandPiece, String> {
    let (name, rest) = match s.split_once('=') {
        Some((name, rest)) if !name.is_empty() => (name.to_string(), rest),
        Some(_) => return Err(format!("empty piece name in '{}'", s)),
        None => (format!("p{}", index + 1), s),
    };
    let (rest, category) = rest.split_once('/').unwrap_or((rest, ""));
    let (cut, thickness) = rest
        .split_once('@')
        .ok_or_else(|| format!("invalid piece '{}', expected WxH:qty@thickness", s))?;
    let (dims, qty) = cut
        .split_once(':')
        .ok_or_else(|| format!("invalid piece '{}', expected WxH:qty@thickness", s))?;
    let (width, height) = parse_dimensions(dims, s)?;
    let quantity = parse_number(qty, "quantity", s)?;
    if quantity == 0 {
        return Err(format!("quantity must be non-zero in '{}'", s));
    }
    let thickness = parse_thickness(thickness, s)?;
    Ok(DemandPiece::new(name, width, height, quantity, thickness).with_category(category))
}

fn parse_all<T>(
    inputs: &[String],
    parse: fn(&str, usize) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, s)| parse(s, i))
        .collect()
}

fn exit_with(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn print_result(result: &OptimizationResult, sufficiency: &SufficiencyReport) {
    for layout in &result.layouts {
        println!(
            "Sheet {} ({}, {}mm), {:.1}% waste:",
            layout.sheet_id,
            layout.sheet_rect(),
            layout.thickness,
            layout.waste_percentage
        );
        for p in &layout.placements {
            let rot = if p.rotated { " [rotated]" } else { "" };
            println!(
                "  {:>3}. {} {} @ ({}, {}){}",
                p.cut_sequence,
                p.piece_name,
                p.rect(),
                p.x,
                p.y,
                rot
            );
        }
        println!();
    }

    if !result.is_complete() {
        println!("Unmatched:");
        for d in &result.unmatched {
            println!(
                "  {} {}x{} x{} ({}mm)",
                d.name, d.width, d.height, d.quantity, d.thickness
            );
        }
        println!();
    }

    println!(
        "Summary: {} sheet{} used, {:.1}% waste",
        result.sheets_used,
        if result.sheets_used == 1 { "" } else { "s" },
        result.waste_percentage,
    );
    println!(
        "Material: {} mm² required, {} mm² available{}",
        sufficiency.required_area,
        sufficiency.available_area,
        if sufficiency.is_sufficient {
            String::new()
        } else {
            format!(", short by {} mm²", sufficiency.shortfall)
        }
    );
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_max_level(Level::DEBUG)
            .init();
    }

    let supply = parse_all(&cli.sheets, parse_sheet).unwrap_or_else(|e| exit_with(e));
    let demand = parse_all(&cli.pieces, parse_piece).unwrap_or_else(|e| exit_with(e));

    let result = Optimizer::new()
        .with_kerf(cli.kerf)
        .optimize(&demand, &supply, cli.mode, !cli.no_rotate)
        .unwrap_or_else(|e| exit_with(e));
    let sufficiency = check_sufficiency(&demand, &supply);

    if cli.json {
        let report = Report {
            mode: cli.mode,
            result: &result,
            sufficiency,
            estimate: estimate_material_needed(&demand),
        };
        let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| exit_with(e));
        println!("{}", json);
    } else {
        print_result(&result, &sufficiency);
    }
}

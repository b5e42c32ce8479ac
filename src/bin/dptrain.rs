// Exercise DisplayPort link training against a simulated sink.
//
// Copyright (C) 2025, Intel Corporation

use std::io::{self, IsTerminal, Result};
use std::process;
use std::sync::Arc;

use ansi_term::Colour::{Green, Red};
use clap::Parser;

use dplink::{
    aux::AuxChannel,
    phy::PhyParamStore,
    sim::{SimConfig, SimSink},
    sink::handle_sink_irq,
    training::LinkTraining,
    util,
};

#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Exercise DisplayPort link training against a simulated sink", long_about = None)]
struct Args {
    /// Initial link rate (rbr, hbr, hbr2, hbr3)
    #[arg(short, long, default_value = "hbr3")]
    rate: String,
    /// Initial lane count (1, 2 or 4)
    #[arg(short, long, default_value = "4")]
    lanes: String,
    /// Request FEC after training
    #[arg(short, long, default_value_t = false)]
    fec: bool,
    /// Highest link rate the simulated sink trains at
    #[arg(long, default_value = "hbr2")]
    sink_rate: String,
    /// Highest lane count the simulated sink trains at
    #[arg(long, default_value = "4")]
    sink_lanes: String,
    /// Status reads before the sink reports clock recovery
    #[arg(long, default_value_t = 2)]
    cr_after: u32,
    /// Status reads before the sink reports equalization done
    #[arg(long, default_value_t = 2)]
    eq_after: u32,
    /// Probability of the sink deferring any one AUX transaction
    #[arg(long, default_value_t = 0.0)]
    defer: f64,
    /// Dump a DPCD range after training, e.g. 0x200:16
    #[arg(short, long, value_parser = parse_range)]
    dump: Option<(u32, u8)>,
    /// Output the negotiated parameters in JSON
    #[arg(short, long, default_value_t = false)]
    json: bool,
}

fn parse_range(s: &str) -> std::result::Result<(u32, u8), String> {
    let (address, size) = s.split_once(':').ok_or("expected ADDRESS:SIZE")?;
    let address = util::parse_number::<u32>(address).ok_or("invalid address")?;
    let size = util::parse_number::<u8>(size).ok_or("invalid size")?;
    Ok((address, size))
}

fn color_verdict(ok: bool) -> String {
    let verdict = if ok { "trained" } else { "failed" };
    if io::stdout().is_terminal() {
        if ok {
            Green.paint(verdict).to_string()
        } else {
            Red.paint(verdict).to_string()
        }
    } else {
        String::from(verdict)
    }
}

fn dump_dpcd(training: &mut LinkTraining, address: u32, size: u8) -> Result<()> {
    let mut buf = vec![0u8; size as usize];
    training.aux_mut().read(address, &mut buf)?;

    for (i, chunk) in buf.chunks(8).enumerate() {
        print!("{:#07x}:", address + i as u32 * 8);
        for byte in chunk {
            print!(" {:02x}", byte);
        }
        println!();
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = SimConfig {
        cr_converge_after: Some(args.cr_after),
        eq_converge_after: Some(args.eq_after),
        max_rate: args.sink_rate.as_str().into(),
        max_lanes: args.sink_lanes.as_str().into(),
        fec_detect: args.fec,
        defer_chance: args.defer,
        ..Default::default()
    };

    let mut store = PhyParamStore::new();
    store.set_link_rate(args.rate.as_str().into());
    store.set_lane_count(args.lanes.as_str().into());
    store.set_fec(args.fec);

    let sink = Arc::new(SimSink::new(config));
    let (aux, completion) = AuxChannel::new(sink.clone());
    sink.attach(completion);

    let mut training = LinkTraining::new(sink, aux, store.session_param());
    let result = training.run();

    match &result {
        Ok(status) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(status)?);
            } else {
                println!("Link {}", color_verdict(true));
                println!("  lanes      : {}", status.lane_count);
                println!("  rate       : {}", status.link_rate);
                println!("  rate Mb/s  : {}", status.rate_mbps);
                println!("  clock kHz  : {}", status.link_clock_khz);
                println!("  swing      : {:?}", status.vswing);
                println!("  pre-emp    : {:?}", status.preemp);
                println!("  fec        : {}", status.fec);
            }
        }
        Err(err) => {
            eprintln!("Link {}: {}", color_verdict(false), err);
        }
    }

    if result.is_ok() {
        // Show that the service interrupt path is quiet after training.
        let irq = handle_sink_irq(training.aux_mut())?;
        if irq.raw != 0 {
            println!("  sink irq   : {:#04x}", irq.raw);
        }
        if let Some((address, size)) = args.dump {
            dump_dpcd(&mut training, address, size)?;
        }
    }

    result.map(|_| ())
}

fn main() {
    let args = Args::parse();

    if let Err(_err) = run(&args) {
        process::exit(1);
    }
}

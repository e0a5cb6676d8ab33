use std::time::Duration;

use trace_fox::{ProbeMethod, TraceConfig};

type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(argh::FromArgs)]
/// traceroute - print the route packets take to a network host
struct Args {
    #[argh(option, short = 'm', default = "trace_fox::DEFAULT_MAX_HOPS")]
    /// maximum number of hops (max time-to-live value)
    max_hops: u8,

    #[argh(option, short = 'q', default = "trace_fox::DEFAULT_NUM_PACKETS")]
    /// number of probe packets per hop
    queries: usize,

    #[argh(option, short = 'w', default = "2.0")]
    /// seconds to wait for a response to a probe
    wait: f64,

    #[argh(option, short = 'p', default = "trace_fox::DEFAULT_BASE_PORT")]
    /// destination port of the first UDP probe
    port: u16,

    #[argh(switch, short = 'I')]
    /// use ICMP ECHO instead of UDP datagrams
    icmp: bool,

    #[argh(switch, short = 'v')]
    /// log probes and replies
    verbose: bool,

    #[argh(positional)]
    /// host name or IPv4 address
    host: String,
}

fn main() -> Result<(), GenericError> {
    let args: Args = argh::from_env();

    let max_level = if args.verbose { tracing::Level::TRACE } else { tracing::Level::WARN };
    let subscriber = tracing_subscriber::FmtSubscriber::builder().with_max_level(max_level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = TraceConfig {
        max_hops: args.max_hops,
        num_packets: args.queries,
        timeout: Duration::try_from_secs_f64(args.wait)?,
        base_port: args.port,
        method: if args.icmp { ProbeMethod::IcmpEcho } else { ProbeMethod::Udp },
    };

    let trace = trace_fox::trace(&args.host, &config)?;
    println!("traceroute to {} ({}), {} hops max", args.host, trace.destination(), config.max_hops);
    for hop in trace {
        println!("{}", hop?);
    }

    Ok(())
}

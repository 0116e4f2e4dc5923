//! Example: fit a tiny conv net to a random target with grouped AdamW.
//!
//! Shows the three helpers together: parameter groups feed the optimiser,
//! the schedule sets the learning rate every iteration, and running
//! statistics smooth the loss for logging.
//!
//! Run:
//!   RUST_LOG=info cargo run -p segtrain-train --example fit_convnet -- --config config.json

use std::path::PathBuf;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;

use segtrain_common::RunConfig;
use segtrain_core::{group_weight, Layer};
use segtrain_train::{GroupedAdamW, PolyLrScheduler, Statistic};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    #[arg(long, default_value = "50")]
    log_every: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = if args.config.exists() {
        RunConfig::load_validated(&args.config)?
    } else {
        RunConfig::default()
    };
    config.schedule.max_iters = config.schedule.max_iters.min(500);
    config.schedule.warmup_iters = config.schedule.warmup_iters.min(50);
    config.schedule.validate()?;

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = Layer::container("net")
        .with_child(Layer::conv(2, 1, 4, 3, true, vb.pp("conv"))?)
        .with_child(Layer::batch_norm(2, 4, vb.pp("bn"))?);

    let (conv, bn) = (&model.children()[0], &model.children()[1]);
    let conv_w = conv.weight().map(|v| v.as_tensor().clone());
    let conv_b = conv.bias().map(|v| v.as_tensor().clone());
    let conv_fwd = candle_nn::Conv2d::new(
        conv_w.ok_or_else(|| anyhow::anyhow!("conv has no weight"))?,
        conv_b,
        Default::default(),
    );
    let bn_w = bn.weight().ok_or_else(|| anyhow::anyhow!("bn has no weight"))?;
    let bn_b = bn.bias().ok_or_else(|| anyhow::anyhow!("bn has no bias"))?;

    let groups = group_weight(&model);
    let mut opt = GroupedAdamW::new(&groups, &config.optim, config.schedule.warmup_lr)?;
    let mut sched = PolyLrScheduler::new(config.schedule.clone());

    let input = Tensor::randn(0f32, 1.0, (8, 1, 6, 6), &device)?;
    let target = Tensor::randn(0f32, 1.0, (8, 4, 4, 4), &device)?;
    let mut loss_stat = Statistic::new(config.log_window);

    while !sched.finished() {
        let lr = sched.apply(&mut opt);
        let x = conv_fwd.forward(&input)?;
        // Affine part of the batch norm only; the statistics do not matter here.
        let x = x
            .broadcast_mul(&bn_w.as_tensor().reshape((1, 4, 1, 1))?)?
            .broadcast_add(&bn_b.as_tensor().reshape((1, 4, 1, 1))?)?;
        let loss = (x - &target)?.sqr()?.mean_all()?;
        loss_stat.update(loss.to_scalar::<f32>()? as f64);
        opt.backward_step(&loss)?;

        if sched.step() % args.log_every.max(1) == 0 {
            tracing::info!(
                iter = sched.step(),
                lr = format!("{lr:.6}"),
                loss = %loss_stat,
                "train"
            );
        }
        sched.advance();
    }

    println!("final loss (smoothed): {loss_stat}");
    Ok(())
}

use hashvgg::config::NetConfig;
use hashvgg::data::Dataset;
use hashvgg::model::{HashVgg, ModelOptions};
use hashvgg::summary::SummaryWriter;
use hashvgg::tensors::Tensor;
use hashvgg::train::{epoch_batches, shuffled_indices, FitOptions, Trainer, WeightedMean};
use std::env;
use std::fs;

fn tiny_config() -> NetConfig {
    NetConfig {
        input: (4, 4, 1),
        conv_layers: vec![1],
        conv_channels: vec![2],
        dense_units: vec![3],
        hash_codes: 2,
        lambda_l1: 0.0,
        lambda_l2: 5e-4,
    }
}

fn tiny_options(tag: &str) -> ModelOptions {
    ModelOptions {
        save_path: format!(
            "{}/hashvgg_{}_{}",
            env::temp_dir().display(),
            tag,
            std::process::id()
        ),
        ..ModelOptions::default()
    }
}

fn dataset(n: usize) -> Dataset {
    let input = Tensor::new(
        vec![n, 4, 4, 1],
        (0..n * 16).map(|i| (i % 5) as f64 / 5.0).collect(),
    );
    let labels = Tensor::new(vec![n, 1], (0..n).map(|i| (i % 2) as f64).collect());
    Dataset::new(input, labels)
}

#[test]
fn test_epoch_batches_cover_all_indices() {
    let mut rng = rand::rng();
    let perm = shuffled_indices(10, &mut rng);
    let batches = epoch_batches(&perm, 4, false);

    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![4, 4, 2]);

    let mut seen = batches.concat();
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_sorted_fetch_keeps_membership() {
    let perm = vec![9, 2, 5, 0, 7, 1, 8, 3, 6, 4];
    let batches = epoch_batches(&perm, 4, true);
    assert_eq!(batches[0], vec![0, 2, 5, 9]);
    assert_eq!(batches[1], vec![1, 3, 7, 8]);
    assert_eq!(batches[2], vec![4, 6]);
}

#[test]
fn test_unsorted_fetch_keeps_draw_order() {
    let perm = vec![9, 2, 5, 0, 7];
    let batches = epoch_batches(&perm, 2, false);
    assert_eq!(batches, vec![vec![9, 2], vec![5, 0], vec![7]]);
}

#[test]
fn test_shuffled_indices_is_permutation() {
    let mut rng = rand::rng();
    let mut perm = shuffled_indices(100, &mut rng);
    perm.sort_unstable();
    assert_eq!(perm, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_weighted_mean_matches_hand_aggregation() {
    let mut loss = WeightedMean::default();
    loss.add(0.2, 3.0);
    loss.add(0.5, 2.0);
    assert!((loss.mean() - 0.32).abs() < 1e-12);

    let mut acc = WeightedMean::default();
    acc.add(0.9, 3.0);
    acc.add(0.8, 2.0);
    assert!((acc.mean() - 0.86).abs() < 1e-12);

    assert_eq!(WeightedMean::default().mean(), 0.0);
}

#[test]
fn test_dataset_gather_and_slice() {
    let input = Tensor::new(
        vec![4, 2],
        vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0, 30.0, 31.0],
    );
    let labels = Tensor::new(vec![4, 1], vec![0.0, 1.0, 1.0, 0.0]);
    let data = Dataset::new(input, labels);
    assert_eq!(data.len(), 4);
    assert_eq!(data.sample_shape(), &[2]);

    let (inp, out) = data.gather(&[2, 0]);
    assert_eq!(inp.shape, vec![2, 2]);
    assert_eq!(inp.data, vec![20.0, 21.0, 0.0, 1.0]);
    assert_eq!(out.data, vec![1.0, 0.0]);

    let (inp, out) = data.slice(1..3);
    assert_eq!(inp.data, vec![10.0, 11.0, 20.0, 21.0]);
    assert_eq!(out.data, vec![1.0, 1.0]);
}

#[test]
fn test_evaluate_weighs_uneven_batches() {
    let mut model = HashVgg::build(tiny_config(), tiny_options("evalweigh")).unwrap();
    let dev = dataset(5);

    // hand-woven sample-weighted mean over a 3/2 batch split
    let (i1, o1) = dev.slice(0..3);
    let (i2, o2) = dev.slice(3..5);
    let a = model.eval_batch(&i1, &o1);
    let b = model.eval_batch(&i2, &o2);
    let expect_loss = (a.loss * 3.0 + b.loss * 2.0) / 5.0;
    let expect_acc = (a.accuracy * 3.0 + b.accuracy * 2.0) / 5.0;

    let log_dir = format!(
        "{}/hashvgg_evalweigh_log_{}",
        env::temp_dir().display(),
        std::process::id()
    );
    let mut summary = SummaryWriter::create(&log_dir).unwrap();
    let mut trainer = Trainer::new(&mut model, &mut summary);

    let metrics = trainer.evaluate(&dev, 3, 0, false).unwrap();
    assert!((metrics.loss - expect_loss).abs() < 1e-12);
    assert!((metrics.accuracy - expect_acc).abs() < 1e-12);
    // without add_summary the bottles stay untouched
    assert_eq!(trainer.loss_bottle(), 0.0);

    let logged = trainer.evaluate(&dev, 3, 42, true).unwrap();
    assert_eq!(trainer.loss_bottle(), logged.loss);
    assert_eq!(trainer.metric_bottle(), logged.accuracy);
}

#[test]
fn test_hidden_features_concatenate_batches() {
    let mut model = HashVgg::build(tiny_config(), tiny_options("hiddenfeat")).unwrap();
    let dev = dataset(5);

    // one whole-set pass as the reference
    let (inp, out) = dev.slice(0..5);
    let (_, whole) = model.eval_batch_with_hidden(&inp, &out);

    let log_dir = format!(
        "{}/hashvgg_hiddenfeat_log_{}",
        env::temp_dir().display(),
        std::process::id()
    );
    let mut summary = SummaryWriter::create(&log_dir).unwrap();
    let trainer = Trainer::new(&mut model, &mut summary);

    let features = trainer.hidden_features(&dev, 2);
    assert_eq!(features.len(), 2);
    assert_eq!(features[0].shape, vec![5, 3]);
    assert_eq!(features[1].shape, vec![5, 2]);
    assert_eq!(features[0].data, whole[0].data);
    assert_eq!(features[1].data, whole[1].data);
}

#[test]
fn test_fit_writes_summaries_and_checkpoints() {
    let dir = format!(
        "{}/hashvgg_fit_{}",
        env::temp_dir().display(),
        std::process::id()
    );
    let _ = fs::remove_dir_all(&dir);
    let log_dir = format!("{}/log", dir);
    let save_dir = format!("{}/ckpt", dir);

    let options = ModelOptions {
        save_path: save_dir.clone(),
        name: "fit_smoke".to_string(),
        ..ModelOptions::default()
    };
    let mut model = HashVgg::build(tiny_config(), options).unwrap();
    let train = dataset(6);
    let dev = dataset(4);

    let mut summary = SummaryWriter::create(&log_dir).unwrap();
    let mut trainer = Trainer::new(&mut model, &mut summary);
    let fit = FitOptions {
        batch_size: 2,
        epochs: 1,
        summary_step: 2,
        save_step: 3,
        sorted_fetch: true,
    };
    trainer.fit(&train, &dev, &fit).unwrap();
    // the step-2 summary ran a full evaluation
    assert!(trainer.loss_bottle() > 0.0);
    drop(trainer);

    assert_eq!(model.global_step(), 3);
    assert!((model.l_rate() - 0.05 * 0.999_f64.powi(3)).abs() < 1e-15);

    let events = fs::read_to_string(format!("{}/events.tsv", log_dir)).unwrap();
    assert!(events.contains("train/loss"));
    assert!(events.contains("train/acc"));
    assert!(events.contains("dev/loss"));
    assert!(events.contains("dev/acc"));
    assert!(events.lines().any(|line| line.starts_with("2\t")));

    // written by the save_step cadence, the epoch end, and the finish
    assert!(fs::metadata(format!("{}/fit_smoke-3.bpat", save_dir)).is_ok());
}

use batch_pipeline::{
    channel, ConsoleSink, ConsoleSource, FlushTrigger, PipelineBuilder, Value,
};
use std::io::Cursor;
use std::thread;
use std::time::Duration;

const LONG: Duration = Duration::from_secs(60);

fn feed(values: Vec<Value>) -> (crossbeam::channel::Receiver<Value>, thread::JoinHandle<()>) {
    let (tx, rx) = channel();
    let handle = thread::spawn(move || {
        for value in values {
            tx.send(value).expect("pipeline input closed");
        }
    });
    (rx, handle)
}

#[test]
fn test_console_scenario_end_to_end() {
    let mut pipeline = PipelineBuilder::new()
        .buffer_size(5)
        .flush_interval(LONG)
        .build()
        .expect("Pipeline build failed");

    let input = Cursor::new("5\n-2\n9\n0\n12\nabc\n6\nexit\n");
    let (source, source_handle) = ConsoleSource::new(input, Vec::new())
        .spawn()
        .expect("Source spawn failed");
    let running = pipeline.start(source).expect("Pipeline start failed");

    let mut sink = ConsoleSink::new(Vec::new());
    let received = sink.consume(&running.output()).expect("Consume failed");
    running.wait().expect("Wait failed");
    let report = source_handle.join().unwrap().expect("Source failed");

    assert_eq!(received, 3);
    assert_eq!(report.accepted, 6);
    assert_eq!(report.invalid, 1);

    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        text,
        ">>> Received data: 9\n>>> Received data: 12\n>>> Received data: 6\nPipeline finished!\n"
    );

    let flushes = pipeline.stage_metrics(2).unwrap().flushes();
    assert_eq!(flushes.len(), 1);
    assert_eq!(flushes[0].trigger, FlushTrigger::Drain);
    assert_eq!(flushes[0].size, 3);
}

#[test]
fn test_filters_drop_everything_but_positive_multiples_of_3() {
    let mut pipeline = PipelineBuilder::new()
        .buffer_size(4)
        .flush_interval(LONG)
        .build()
        .expect("Pipeline build failed");

    let (source, producer) = feed((-20..=20).collect());
    let running = pipeline.start(source).expect("Pipeline start failed");

    let received = running.collect().expect("Collect failed");
    producer.join().unwrap();

    assert_eq!(received, vec![3, 6, 9, 12, 15, 18]);
    assert_eq!(pipeline.stage_metrics(0).unwrap().total_rejected(), 20);
    // 0 plus the fourteen positives that are not multiples of 3
    assert_eq!(pipeline.stage_metrics(1).unwrap().total_rejected(), 15);
}

#[test]
fn test_capacity_flush_then_drain() {
    let mut pipeline = PipelineBuilder::new()
        .buffer_size(3)
        .flush_interval(LONG)
        .build()
        .expect("Pipeline build failed");

    let (source, producer) = feed(vec![3, 6, 9, 12, 15]);
    let running = pipeline.start(source).expect("Pipeline start failed");

    assert_eq!(running.collect().expect("Collect failed"), vec![3, 6, 9, 12, 15]);
    producer.join().unwrap();

    let flushes = pipeline.stage_metrics(2).unwrap().flushes();
    let shape: Vec<_> = flushes.iter().map(|f| (f.trigger, f.size)).collect();
    assert_eq!(
        shape,
        vec![(FlushTrigger::Capacity, 3), (FlushTrigger::Drain, 2)]
    );
}

#[test]
fn test_timer_flush_reaches_consumer_before_close() {
    let mut pipeline = PipelineBuilder::new()
        .buffer_size(5)
        .flush_interval(Duration::from_millis(150))
        .build()
        .expect("Pipeline build failed");

    let (input, source) = channel();
    let running = pipeline.start(source).expect("Pipeline start failed");
    let output = running.output();

    input.send(21).unwrap();
    input.send(-3).unwrap();
    input.send(24).unwrap();

    let first = output.recv_timeout(Duration::from_secs(5)).unwrap();
    let second = output.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!((first, second), (21, 24));

    drop(input);
    assert!(output.recv().is_err());
    running.wait().expect("Wait failed");

    let flushes = pipeline.stage_metrics(2).unwrap().flushes();
    assert_eq!(flushes.len(), 1);
    assert_eq!(flushes[0].trigger, FlushTrigger::Timer);
}

#[test]
fn test_slow_consumer_applies_backpressure() {
    let mut pipeline = PipelineBuilder::new()
        .buffer_size(2)
        .flush_interval(LONG)
        .build()
        .expect("Pipeline build failed");

    let (input, source) = channel();
    let running = pipeline.start(source).expect("Pipeline start failed");
    let output = running.output();

    let producer = thread::spawn(move || {
        let mut sent = 0;
        for value in [3, 6, 9, 12, 15, 18, 21, 24] {
            input.send(value).unwrap();
            sent += 1;
        }
        sent
    });

    // Nobody reads: the chain fills up and the producer must stall.
    thread::sleep(Duration::from_millis(200));
    assert!(!producer.is_finished());

    let received: Vec<Value> = output.iter().collect();
    assert_eq!(producer.join().unwrap(), 8);
    running.wait().expect("Wait failed");
    assert_eq!(received, vec![3, 6, 9, 12, 15, 18, 21, 24]);
}

#[test]
fn test_empty_input_closes_without_output() {
    let mut pipeline = PipelineBuilder::new()
        .flush_interval(Duration::from_millis(20))
        .build()
        .expect("Pipeline build failed");

    let (input, source) = channel();
    let running = pipeline.start(source).expect("Pipeline start failed");

    thread::sleep(Duration::from_millis(100));
    drop(input);

    assert!(running.collect().expect("Collect failed").is_empty());
    assert_eq!(pipeline.stage_metrics(2).unwrap().total_flushes(), 0);
}

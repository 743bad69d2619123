//! Archive job, trigger-token and registry tests against a mock origin

use std::time::Duration;

use site_archiver::{
    ArchiveEvent, ArchiveMetadata, ArchiveRequest, ErrorKind, JobState, RegistryError,
    process_archive_links,
};

mod common;
use common::{
    PNG_FIXTURE, create_test_dir, create_test_html, files_in, fixed_archiver, mock_page,
    mock_resource, mock_status, noon,
};

#[tokio::test]
async fn trigger_token_is_replaced_by_a_link_to_the_archive() {
    let mut server = mockito::Server::new_async().await;
    let page = create_test_html(
        "Example Title",
        r#"<link rel="stylesheet" href="/s.css">"#,
        r#"<img src="/a.png"><p>Hello</p>"#,
    );
    let _page = mock_page(&mut server, "/article", &page).await;
    let _css = mock_resource(&mut server, "/s.css", "text/css", "p{margin:0}").await;
    let _png = mock_resource(&mut server, "/a.png", "image/png", PNG_FIXTURE).await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let mut events = archiver.events().subscribe();

    let text = format!("Check this +{}/article", server.url());
    let report = process_archive_links(&text, &archiver).await;

    let filename = "2024_01_01_120000_Example_Title-127_0_0_1.html";
    assert_eq!(
        report.text,
        format!("Check this [Example Title](assets/sites/{filename}) (archived 2024-01-01 12:00)")
    );
    assert!(report.failed.is_empty());
    assert_eq!(report.archived.len(), 1);

    let sites = root.path().join("assets/sites");
    assert_eq!(files_in(&sites), vec![filename.to_string()]);

    let saved = std::fs::read_to_string(sites.join(filename)).unwrap();
    let first_line = saved.lines().next().unwrap();
    assert!(first_line.starts_with("<!-- site-archiver "));
    let metadata = ArchiveMetadata::from_comment(first_line).unwrap();
    assert_eq!(metadata.title, "Example Title");
    assert_eq!(metadata.source_url, format!("{}/article", server.url()));
    assert_eq!(metadata.archived_at, noon());

    assert!(saved.contains("p{margin:0}"));
    assert!(saved.contains("data:image/png;base64,"));
    assert!(saved.contains("class=\"site-archiver-banner\""));
    assert!(!saved.contains("rel=\"stylesheet\""));

    match events.recv().await.unwrap() {
        ArchiveEvent::Created { title, path, .. } => {
            assert_eq!(title, "Example Title");
            assert_eq!(path, format!("assets/sites/{filename}"));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn failed_page_fetch_leaves_text_and_disk_untouched() {
    let mut server = mockito::Server::new_async().await;
    let _page = mock_status(&mut server, "/down", 500).await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let mut events = archiver.events().subscribe();

    let text = format!("Broken +{}/down here", server.url());
    let report = process_archive_links(&text, &archiver).await;

    assert_eq!(report.text, text);
    assert!(report.archived.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, format!("+{}/down", server.url()));
    assert_eq!(report.failed[0].1.kind(), ErrorKind::FetchFailure);
    assert!(files_in(&root.path().join("assets/sites")).is_empty());

    assert!(matches!(
        events.recv().await.unwrap(),
        ArchiveEvent::Failed { .. }
    ));
}

#[tokio::test]
async fn repeated_token_is_archived_once() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/twice")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(create_test_html("Twice", "", "<p>x</p>"))
        .expect(1)
        .create_async()
        .await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());

    let url = format!("{}/twice", server.url());
    let text = format!("+{url} and again +{url}");
    let report = process_archive_links(&text, &archiver).await;

    let link = "[Twice](assets/sites/2024_01_01_120000_Twice-127_0_0_1.html) (archived 2024-01-01 12:00)";
    assert_eq!(report.text, format!("{link} and again {link}"));
    assert_eq!(files_in(&root.path().join("assets/sites")).len(), 1);
    page.assert_async().await;
}

#[tokio::test]
async fn subresource_failures_do_not_fail_the_job() {
    let mut server = mockito::Server::new_async().await;
    let page = create_test_html("Partial", "", r#"<img src="/gone.png">"#);
    let _page = mock_page(&mut server, "/partial", &page).await;
    let _gone = mock_status(&mut server, "/gone.png", 404).await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());

    let request = ArchiveRequest::new(format!("{}/partial", server.url()));
    let report = archiver.run_job(&request, std::future::pending()).await;

    assert_eq!(
        report.history,
        vec![
            JobState::Pending,
            JobState::Fetching,
            JobState::Inlining,
            JobState::Writing,
            JobState::Done
        ]
    );
    assert_eq!(report.resource_failures.len(), 1);
    let result = report.result.unwrap();
    let saved = std::fs::read_to_string(root.path().join(&result.path)).unwrap();
    assert!(saved.contains(r#"<img src="/gone.png">"#));
}

#[tokio::test]
async fn invalid_url_fails_before_fetching() {
    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());

    for url in ["ftp://example.com/file", "not a url", "https://"] {
        let report = archiver
            .run_job(&ArchiveRequest::new(url), std::future::pending())
            .await;
        assert_eq!(report.history, vec![JobState::Pending, JobState::Failed], "{url}");
        assert_eq!(report.result.unwrap_err().kind(), ErrorKind::InvalidUrl);
    }
    assert!(files_in(&root.path().join("assets/sites")).is_empty());
}

#[tokio::test]
async fn redirect_target_is_recorded_as_source() {
    let mut server = mockito::Server::new_async().await;
    let _old = server
        .mock("GET", "/old")
        .with_status(301)
        .with_header("location", "/new")
        .create_async()
        .await;
    let _new = mock_page(&mut server, "/new", &create_test_html("Moved", "", "")).await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let result = archiver
        .archive(&ArchiveRequest::new(format!("{}/old", server.url())))
        .await
        .unwrap();

    assert_eq!(result.source_url, format!("{}/new", server.url()));
    assert_eq!(result.title, "Moved");
}

#[tokio::test]
async fn untitled_page_falls_back_to_host() {
    let mut server = mockito::Server::new_async().await;
    let _page = mock_page(&mut server, "/bare", "<p>no head at all</p>").await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let result = archiver
        .archive(&ArchiveRequest::new(format!("{}/bare", server.url())))
        .await
        .unwrap();

    assert_eq!(result.title, "127.0.0.1");
    assert_eq!(result.filename(), "2024_01_01_120000_127_0_0_1-127_0_0_1.html");

    let saved = std::fs::read_to_string(root.path().join(&result.path)).unwrap();
    let body = saved.split_once('\n').unwrap().1;
    assert!(body.starts_with("<div class=\"site-archiver-banner\""));
    assert!(body.ends_with("<p>no head at all</p>"));
}

#[tokio::test]
async fn second_archive_with_the_same_name_gets_a_suffix() {
    let mut server = mockito::Server::new_async().await;
    let _page = mock_page(&mut server, "/same", &create_test_html("Same", "", "")).await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let request = ArchiveRequest::new(format!("{}/same", server.url()));

    let first = archiver.archive(&request).await.unwrap();
    let before = std::fs::read_to_string(root.path().join(&first.path)).unwrap();

    let second = archiver.archive(&request).await.unwrap();
    assert_eq!(first.filename(), "2024_01_01_120000_Same-127_0_0_1.html");
    assert_eq!(second.filename(), "2024_01_01_120000_Same-127_0_0_1_2.html");
    assert_eq!(second.path, format!("assets/sites/{}", second.filename()));
    assert_eq!(
        std::fs::read_to_string(root.path().join(&first.path)).unwrap(),
        before
    );
    assert!(root.path().join(&second.path).is_file());
}

#[tokio::test]
async fn same_title_pages_in_one_note_are_both_archived() {
    let mut server = mockito::Server::new_async().await;
    let _a = mock_page(&mut server, "/a", &create_test_html("My Blog", "", "<p>a</p>")).await;
    let _b = mock_page(&mut server, "/b", &create_test_html("My Blog", "", "<p>b</p>")).await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());

    let text = format!("see +{0}/a and +{0}/b", server.url());
    let report = process_archive_links(&text, &archiver).await;

    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.archived.len(), 2);
    assert!(!report.text.contains('+'));

    let sites = root.path().join("assets/sites");
    let names = files_in(&sites);
    assert_eq!(
        names,
        vec![
            "2024_01_01_120000_My_Blog-127_0_0_1.html".to_string(),
            "2024_01_01_120000_My_Blog-127_0_0_1_2.html".to_string(),
        ]
    );
    for name in &names {
        assert!(report.text.contains(&format!("[My Blog](assets/sites/{name})")));
    }

    let bodies: Vec<_> = names
        .iter()
        .map(|name| std::fs::read_to_string(sites.join(name)).unwrap())
        .collect();
    assert!(bodies.iter().any(|body| body.contains("<p>a</p>")));
    assert!(bodies.iter().any(|body| body.contains("<p>b</p>")));
}

#[tokio::test]
async fn latin1_page_is_saved_as_utf8() {
    let mut server = mockito::Server::new_async().await;
    let mut body = b"<html><head><meta charset=\"iso-8859-1\"><title>Caf\xE9</title></head>".to_vec();
    body.extend_from_slice(b"<body><p>cr\xE8me br\xFBl\xE9e</p></body></html>");
    let _page = mock_resource(
        &mut server,
        "/menu",
        "text/html; charset=iso-8859-1",
        body,
    )
    .await;

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let result = archiver
        .archive(&ArchiveRequest::new(format!("{}/menu", server.url())))
        .await
        .unwrap();

    assert_eq!(result.title, "Café");
    let saved = std::fs::read_to_string(root.path().join(&result.path)).unwrap();
    assert!(!saved.contains('\u{fffd}'));
    assert!(saved.contains("<p>crème brûlée</p>"));
    assert!(saved.contains(r#"<meta charset="utf-8">"#));
    assert!(!saved.contains("iso-8859-1"));
}

#[tokio::test]
async fn cancelled_job_writes_nothing() {
    // Accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let request = ArchiveRequest::new(format!("http://{addr}/slow"));

    let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = cancel_tx.send(());
    });

    let error = archiver
        .archive_until(&request, async {
            let _ = cancel_rx.await;
        })
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Aborted);
    assert!(files_in(&root.path().join("assets/sites")).is_empty());
    drop(listener);
}

#[tokio::test]
async fn deadline_aborts_a_stalled_job() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let mut events = archiver.events().subscribe();

    let error = archiver
        .archive_with_deadline(
            &ArchiveRequest::new(format!("http://{addr}/slow")),
            Duration::from_millis(150),
        )
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::Aborted);
    assert!(error.to_string().contains("150ms"));
    assert!(files_in(&root.path().join("assets/sites")).is_empty());
    assert!(matches!(
        events.recv().await.unwrap(),
        ArchiveEvent::Failed { .. }
    ));
    drop(listener);
}

fn write_archive(dir: &std::path::Path, filename: &str, title: &str, hour: u32) {
    use chrono::TimeZone;

    let metadata = ArchiveMetadata {
        source_url: format!("https://example.com/{hour}"),
        title: title.to_string(),
        archived_at: chrono::Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
    };
    std::fs::write(
        dir.join(filename),
        format!("{}\n<html></html>", metadata.to_comment()),
    )
    .unwrap();
}

#[tokio::test]
async fn registry_lists_newest_first() {
    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let sites = archiver.config().sites_path();
    std::fs::create_dir_all(&sites).unwrap();

    write_archive(&sites, "2024_03_01_080000_Morning-example_com.html", "Morning", 8);
    write_archive(&sites, "2024_03_01_200000_Evening-example_com.html", "Evening", 20);
    std::fs::write(
        sites.join("2023_12_24_180000_Hand_Made_Note-notes_local.html"),
        "<p>no provenance</p>",
    )
    .unwrap();
    std::fs::write(sites.join("readme.txt"), "ignored").unwrap();

    let entries = archiver.registry().list().await.unwrap();
    let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Evening", "Morning", "Hand Made Note"]);
    assert_eq!(entries[0].source_url, "https://example.com/20");
    assert!(entries[2].source_url.is_empty());
}

#[tokio::test]
async fn registry_of_missing_directory_is_empty() {
    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    assert!(archiver.registry().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn registry_delete_removes_file_and_announces_it() {
    let root = create_test_dir();
    let archiver = fixed_archiver(root.path());
    let sites = archiver.config().sites_path();
    std::fs::create_dir_all(&sites).unwrap();
    let filename = "2024_03_01_080000_Morning-example_com.html";
    write_archive(&sites, filename, "Morning", 8);

    let registry = archiver.registry();
    let mut events = archiver.events().subscribe();

    registry.delete(filename).await.unwrap();
    assert!(files_in(&sites).is_empty());
    match events.recv().await.unwrap() {
        ArchiveEvent::Deleted { filename: deleted, .. } => assert_eq!(deleted, filename),
        other => panic!("unexpected event {other:?}"),
    }

    assert!(matches!(
        registry.delete(filename).await,
        Err(RegistryError::NotFound(_))
    ));
    for bad in ["../secrets.html", "a/b.html", "notes.txt", ".hidden.html", ""] {
        assert!(
            matches!(
                registry.delete(bad).await,
                Err(RegistryError::InvalidFilename(_))
            ),
            "{bad}"
        );
    }
}

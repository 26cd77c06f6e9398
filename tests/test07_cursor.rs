mod common;

use std::ops::ControlFlow;

use common::{User, user_configuration, users_source};
use sql_mapper::prelude::*;

#[tokio::test]
async fn rows_are_read_one_fetch_at_a_time() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(user_configuration(&source)?.build()?);
    let mut session = factory.open_session().await?;

    let mut cursor = session.select_cursor("users.findAll", ()).await?;
    assert_eq!(source.stats().rows_fetched, 0);
    assert!(cursor.is_open().await);

    let ann = cursor.fetch_next().await?.and_then(Object::into_bean::<User>);
    assert_eq!(ann.map(|user| user.name), Some("ann".to_string()));
    assert_eq!(source.stats().rows_fetched, 1);
    assert_eq!(cursor.fetched().await, 1);

    cursor.fetch_next().await?;
    assert_eq!(source.stats().rows_fetched, 2);
    assert_eq!(source.stats().open_handles(), 1);

    assert_eq!(cursor.fetch_all().await?.len(), 1);
    assert!(cursor.is_consumed().await);
    assert_eq!(source.stats().open_handles(), 0);
    assert!(cursor.fetch_next().await?.is_none());

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn cursor_honours_offset_and_limit() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(user_configuration(&source)?.build()?);
    let mut session = factory.open_session().await?;

    let mut cursor = session
        .select_cursor_with_bounds("users.findAll", (), RowBounds::new(1, 1))
        .await?;
    let names: Vec<String> = cursor
        .fetch_all()
        .await?
        .into_iter()
        .filter_map(Object::into_bean::<User>)
        .map(|user| user.name)
        .collect();
    assert_eq!(names, ["bob"]);
    assert!(cursor.is_consumed().await);
    assert_eq!(source.stats().open_handles(), 0);

    let page = session
        .select_list_with_bounds("users.findAll", (), RowBounds::new(2, 10))
        .await?;
    assert_eq!(page.len(), 1);
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn explicit_close_releases_the_handle() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(user_configuration(&source)?.build()?);
    let mut session = factory.open_session().await?;

    let mut cursor = session.select_cursor("users.findAll", ()).await?;
    cursor.fetch_next().await?;
    cursor.close().await?;
    assert!(!cursor.is_open().await);
    assert!(!cursor.is_consumed().await);
    assert_eq!(source.stats().open_handles(), 0);

    let err = cursor.fetch_next().await.unwrap_err();
    assert!(matches!(err, SqlMapperError::ResourceClosed(_)), "{err}");
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn closing_the_session_closes_its_cursors() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(user_configuration(&source)?.build()?);
    let mut session = factory.open_session().await?;

    let mut first = session.select_cursor("users.findAll", ()).await?;
    let mut second = session.select_cursor("users.findById", Parameter::map().with("id", 2)).await?;
    first.fetch_next().await?;
    assert_eq!(source.stats().open_handles(), 2);

    session.close().await?;
    assert_eq!(source.stats().open_handles(), 0);

    for cursor in [&mut first, &mut second] {
        let err = cursor.fetch_next().await.unwrap_err();
        assert!(matches!(err, SqlMapperError::ResourceClosed(_)), "{err}");
    }
    Ok(())
}

#[tokio::test]
async fn handler_break_stops_reading() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let factory = SqlSessionFactory::new(user_configuration(&source)?.build()?);
    let mut session = factory.open_session().await?;

    let mut seen = Vec::new();
    let mut first_two = |result: Object, index: usize| {
        if let Some(user) = result.into_bean::<User>() {
            seen.push(user.id);
        }
        if index == 1 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    let handled = session
        .select_with_handler("users.findAll", (), RowBounds::default(), &mut first_two)
        .await?;

    assert_eq!(handled, 2);
    assert_eq!(seen, [1, 2]);
    let stats = source.stats();
    assert_eq!(stats.rows_fetched, 2);
    assert_eq!(stats.open_handles(), 0);

    let mut all = 0;
    let mut count_all = |_: Object, _: usize| {
        all += 1;
        ControlFlow::Continue(())
    };
    let handled = session
        .select_with_handler("users.findAll", (), RowBounds::default(), &mut count_all)
        .await?;
    assert_eq!((handled, all), (3, 3));
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn mapper_cursor_operations_return_a_cursor() -> Result<(), Box<dyn std::error::Error>> {
    let source = users_source();
    let configuration = user_configuration(&source)?
        .mapper(Contract::new("users").operation(OperationDecl::new("findAll", ReturnShape::Cursor)))
        .build()?;
    let factory = SqlSessionFactory::new(configuration);
    let mut session = factory.open_session().await?;

    let mut mapper = session.get_mapper("users")?;
    let mut cursor = mapper.invoke("findAll", Vec::new()).await?.into_cursor()?;
    assert_eq!(cursor.fetch_all().await?.len(), 3);
    session.close().await?;
    Ok(())
}
